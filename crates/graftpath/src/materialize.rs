use std::collections::HashMap;

use crate::facade::NodeFacade;
use crate::model::{HostTree, NodeKind, QName};
use crate::pointer::{NodeRef, Offset, Pointer, Silhouette, SilhouetteArena, SilhouetteId};
use crate::runtime::Error;

/// Owned snapshot of a virtual subtree, taken while the host is borrowed shared and
/// built once the host can be borrowed mutably.
#[derive(Debug)]
enum Blueprint<N> {
    /// Real node spliced by reference; built as a deep clone.
    Copy(N),
    Document(Vec<Blueprint<N>>),
    Element {
        name: QName,
        attributes: Vec<Blueprint<N>>,
        children: Vec<Blueprint<N>>,
    },
    Attribute(QName, String),
    Text(String),
    Comment(String),
    ProcessingInstruction(String, String),
}

impl<N: Clone> Blueprint<N> {
    fn capture<H: HostTree<Node = N>>(
        host: &H,
        arena: &SilhouetteArena<N>,
        node: &NodeRef<N>,
    ) -> Self {
        let id = match node {
            NodeRef::Real(n) => return Blueprint::Copy(n.clone()),
            NodeRef::Silhouette(id) => *id,
        };
        match arena.get(id) {
            Silhouette::Document { children } => {
                Blueprint::Document(Self::capture_all(host, arena, children))
            }
            Silhouette::Element {
                name,
                attributes,
                children,
            } => Blueprint::Element {
                name: name.clone(),
                attributes: Self::capture_all(host, arena, attributes),
                children: Self::capture_all(host, arena, children),
            },
            Silhouette::Attribute { name, value } => Blueprint::Attribute(name.clone(), value.clone()),
            Silhouette::Text { data } => Blueprint::Text(data.clone()),
            Silhouette::Comment { data } => Blueprint::Comment(data.clone()),
            Silhouette::ProcessingInstruction { target, data } => {
                Blueprint::ProcessingInstruction(target.clone(), data.clone())
            }
        }
    }

    /// Real document types in a slot list are left out, as navigation never shows them.
    fn capture_all<H: HostTree<Node = N>>(
        host: &H,
        arena: &SilhouetteArena<N>,
        list: &[NodeRef<N>],
    ) -> Vec<Self> {
        list.iter()
            .filter(|c| !matches!(c, NodeRef::Real(n) if host.kind(n) == NodeKind::DocumentType))
            .map(|c| Self::capture(host, arena, c))
            .collect()
    }

    fn build<H: HostTree<Node = N>>(self, host: &mut H) -> Result<N, Error> {
        match self {
            Blueprint::Copy(n) => host.deep_clone(&n),
            Blueprint::Document(children) => {
                let node = host.create_document();
                for child in children {
                    let built = child.build(host)?;
                    host.insert_before(&node, &built, None)?;
                }
                Ok(node)
            }
            Blueprint::Element {
                name,
                attributes,
                children,
            } => {
                let node = host.create_element(name);
                for attribute in attributes {
                    let built = attribute.build(host)?;
                    host.set_attribute(&node, &built)?;
                }
                for child in children {
                    let built = child.build(host)?;
                    host.insert_before(&node, &built, None)?;
                }
                Ok(node)
            }
            Blueprint::Attribute(name, value) => Ok(host.create_attribute(name, &value)),
            Blueprint::Text(data) => Ok(host.create_text(&data)),
            Blueprint::Comment(data) => Ok(host.create_comment(&data)),
            Blueprint::ProcessingInstruction(target, data) => {
                Ok(host.create_processing_instruction(&target, &data))
            }
        }
    }
}

/// Copy the node a pointer denotes, with its subtree, into fresh parentless host nodes.
pub(crate) fn deep_copy<H: HostTree>(
    host: &mut H,
    arena: &SilhouetteArena<H::Node>,
    ptr: &Pointer<H::Node>,
) -> Result<H::Node, Error> {
    Blueprint::capture(&*host, arena, ptr.unwrap()).build(host)
}

/// Builds virtual trees in the host, at most once per virtual root.
#[derive(Debug, Clone)]
pub struct Materializer<N> {
    roots: HashMap<SilhouetteId, N>,
}

impl<N> Default for Materializer<N> {
    fn default() -> Self {
        Self {
            roots: HashMap::new(),
        }
    }
}

impl<N: Clone + Eq + core::hash::Hash + core::fmt::Debug> Materializer<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of virtual roots built so far.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Real node for `ptr`.
    ///
    /// Plain real pointers come back unchanged. A real node positioned at a graft point is
    /// deep-cloned so the result never aliases the original. A silhouette is located inside
    /// the materialized copy of its virtual root.
    pub fn materialize<H: HostTree<Node = N>>(
        &mut self,
        host: &mut H,
        arena: &SilhouetteArena<N>,
        ptr: &Pointer<N>,
    ) -> Result<N, Error> {
        if let NodeRef::Real(node) = ptr.unwrap() {
            if ptr.graft_ancestor().is_none() {
                return Ok(node.clone());
            }
            return host.deep_clone(node);
        }

        // Child offsets count silhouette slots; the built tree hides document types, so
        // each slot is turned into a position among the visible children.
        let mut steps: Vec<Offset> = Vec::new();
        let mut cur = ptr.clone();
        {
            let facade = NodeFacade::new(&*host, arena);
            while let Some(graft) = cur.graft_ancestor() {
                let offset = match &graft.offset {
                    Offset::Index(slot) => Offset::Index(
                        arena
                            .get(graft.parent)
                            .children()
                            .iter()
                            .take(*slot)
                            .filter(|c| facade.slot_visible(c))
                            .count(),
                    ),
                    other => other.clone(),
                };
                let parent = facade
                    .parent_node(&cur, None)?
                    .ok_or_else(|| Error::internal("graft point without a parent"))?;
                steps.push(offset);
                cur = parent;
            }
        }
        let root = cur
            .silhouette_id()
            .ok_or_else(|| Error::internal("virtual tree rooted at a real node"))?;

        let mut node = match self.roots.get(&root) {
            Some(built) => {
                tracing::trace!(root = root.index(), "materialization memo hit");
                built.clone()
            }
            None => {
                let built =
                    Blueprint::capture(&*host, arena, &NodeRef::Silhouette(root)).build(host)?;
                tracing::debug!(root = root.index(), node = ?built, "materialized virtual root");
                self.roots.insert(root, built.clone());
                built
            }
        };

        for step in steps.iter().rev() {
            node = match step {
                Offset::Index(i) => host
                    .children(&node, None)
                    .into_iter()
                    .filter(|c| host.kind(c) != NodeKind::DocumentType)
                    .nth(*i),
                Offset::Attribute(name) => host
                    .attributes(&node, None)
                    .into_iter()
                    .find(|a| host.name(a).as_ref() == Some(name)),
            }
            .ok_or_else(|| {
                Error::internal(format!("materialized tree has no node at {:?}", step))
            })?;
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::SimpleDocument;

    #[test]
    fn real_pointer_without_graft_is_identity() {
        let mut d = SimpleDocument::new();
        let e = d.create_element(QName::local("e"));
        let arena = SilhouetteArena::new();
        let mut m = Materializer::new();
        assert_eq!(m.materialize(&mut d, &arena, &Pointer::real(e)).unwrap(), e);
        assert!(m.is_empty());
    }

    #[test]
    fn silhouette_attribute_is_found_by_name() {
        let mut d = SimpleDocument::new();
        let mut arena = SilhouetteArena::new();
        let a = arena.attribute(QName::local("x"), "1");
        let e = arena.element(QName::local("e"), vec![NodeRef::Silhouette(a)], vec![]);
        let facade = NodeFacade::new(&d, &arena);
        let attr_ptr = facade.all_attributes(&Pointer::silhouette(e), None).remove(0);

        let mut m = Materializer::new();
        let built = m.materialize(&mut d, &arena, &attr_ptr).unwrap();
        assert_eq!(d.value(&built).as_deref(), Some("1"));
        let owner = d.parent(&built, None).unwrap();
        assert_eq!(d.to_xml(owner), r#"<e x="1"/>"#);
    }
}
