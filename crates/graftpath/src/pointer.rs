//! Pointers, silhouettes and graft points.
//!
//! A [`Pointer`] identifies a node for the duration of one evaluation. The node is
//! either a real host node or a [`Silhouette`]: a structural stand-in produced by a
//! constructor that has not been built in the host tree. A pointer may carry a
//! [`GraftPoint`] chain recording where it sits logically under a virtual parent.
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::model::{NodeKind, QName};

/// Index of a silhouette inside the [`SilhouetteArena`] of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SilhouetteId(usize);

impl SilhouetteId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Either a real host node or a silhouette.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef<N> {
    Real(N),
    Silhouette(SilhouetteId),
}

impl<N> NodeRef<N> {
    pub fn is_silhouette(&self) -> bool {
        matches!(self, NodeRef::Silhouette(_))
    }

    pub fn as_real(&self) -> Option<&N> {
        match self {
            NodeRef::Real(n) => Some(n),
            NodeRef::Silhouette(_) => None,
        }
    }

    pub fn as_silhouette(&self) -> Option<SilhouetteId> {
        match self {
            NodeRef::Silhouette(id) => Some(*id),
            NodeRef::Real(_) => None,
        }
    }
}

/// Structural record for a node that does not exist in the host tree (yet).
///
/// Child and attribute lists hold [`NodeRef`]s, so a real node can be spliced under a
/// virtual parent without copying it. Lists are never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Silhouette<N> {
    Document {
        children: Vec<NodeRef<N>>,
    },
    Element {
        name: QName,
        attributes: Vec<NodeRef<N>>,
        children: Vec<NodeRef<N>>,
    },
    Attribute {
        name: QName,
        value: String,
    },
    Text {
        data: String,
    },
    Comment {
        data: String,
    },
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl<N> Silhouette<N> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Silhouette::Document { .. } => NodeKind::Document,
            Silhouette::Element { .. } => NodeKind::Element,
            Silhouette::Attribute { .. } => NodeKind::Attribute,
            Silhouette::Text { .. } => NodeKind::Text,
            Silhouette::Comment { .. } => NodeKind::Comment,
            Silhouette::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
        }
    }

    pub fn name(&self) -> Option<QName> {
        match self {
            Silhouette::Element { name, .. } | Silhouette::Attribute { name, .. } => {
                Some(name.clone())
            }
            Silhouette::ProcessingInstruction { target, .. } => Some(QName::local(target.clone())),
            _ => None,
        }
    }

    pub fn children(&self) -> &[NodeRef<N>] {
        match self {
            Silhouette::Document { children } | Silhouette::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn attributes(&self) -> &[NodeRef<N>] {
        match self {
            Silhouette::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Attribute value or character data.
    pub fn data(&self) -> Option<&str> {
        match self {
            Silhouette::Attribute { value, .. } => Some(value),
            Silhouette::Text { data }
            | Silhouette::Comment { data }
            | Silhouette::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Owner of every silhouette created during one evaluation.
#[derive(Debug, Clone)]
pub struct SilhouetteArena<N> {
    nodes: Vec<Silhouette<N>>,
}

impl<N> Default for SilhouetteArena<N> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<N: Clone> SilhouetteArena<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alloc(&mut self, silhouette: Silhouette<N>) -> SilhouetteId {
        let id = SilhouetteId(self.nodes.len());
        self.nodes.push(silhouette);
        id
    }

    /// Ids are only handed out by `alloc`, so lookups stay in bounds for ids of this arena.
    pub fn get(&self, id: SilhouetteId) -> &Silhouette<N> {
        &self.nodes[id.0]
    }

    pub fn document(&mut self, children: Vec<NodeRef<N>>) -> SilhouetteId {
        self.alloc(Silhouette::Document { children })
    }

    pub fn element(
        &mut self,
        name: QName,
        attributes: Vec<NodeRef<N>>,
        children: Vec<NodeRef<N>>,
    ) -> SilhouetteId {
        self.alloc(Silhouette::Element {
            name,
            attributes,
            children,
        })
    }

    pub fn attribute(&mut self, name: QName, value: impl Into<String>) -> SilhouetteId {
        self.alloc(Silhouette::Attribute {
            name,
            value: value.into(),
        })
    }

    pub fn text(&mut self, data: impl Into<String>) -> SilhouetteId {
        self.alloc(Silhouette::Text { data: data.into() })
    }

    pub fn comment(&mut self, data: impl Into<String>) -> SilhouetteId {
        self.alloc(Silhouette::Comment { data: data.into() })
    }

    pub fn processing_instruction(
        &mut self,
        target: impl Into<String>,
        data: impl Into<String>,
    ) -> SilhouetteId {
        self.alloc(Silhouette::ProcessingInstruction {
            target: target.into(),
            data: data.into(),
        })
    }

    /// Copy-on-write: a new silhouette equal to `id` with a replaced child list.
    /// Returns `None` when `id` cannot have children.
    pub fn with_children(
        &mut self,
        id: SilhouetteId,
        children: Vec<NodeRef<N>>,
    ) -> Option<SilhouetteId> {
        let copy = match self.get(id) {
            Silhouette::Document { .. } => Silhouette::Document { children },
            Silhouette::Element {
                name, attributes, ..
            } => Silhouette::Element {
                name: name.clone(),
                attributes: attributes.clone(),
                children,
            },
            _ => return None,
        };
        Some(self.alloc(copy))
    }

    /// Copy-on-write for the attribute list of an element silhouette.
    pub fn with_attributes(
        &mut self,
        id: SilhouetteId,
        attributes: Vec<NodeRef<N>>,
    ) -> Option<SilhouetteId> {
        let copy = match self.get(id) {
            Silhouette::Element { name, children, .. } => Silhouette::Element {
                name: name.clone(),
                attributes,
                children: children.clone(),
            },
            _ => return None,
        };
        Some(self.alloc(copy))
    }
}

/// Position of a node under a graft parent: an index for children, a name for attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Offset {
    Index(usize),
    Attribute(QName),
}

/// Where a (possibly virtual) node is anchored: the silhouette parent, the slot in that
/// parent, and the graft point of the parent itself.
#[derive(Debug, Clone)]
pub struct GraftPoint {
    pub parent: SilhouetteId,
    pub offset: Offset,
    pub graft_ancestor: Option<Arc<GraftPoint>>,
}

impl GraftPoint {
    pub fn new(
        parent: SilhouetteId,
        offset: Offset,
        graft_ancestor: Option<Arc<GraftPoint>>,
    ) -> Self {
        Self {
            parent,
            offset,
            graft_ancestor,
        }
    }

    /// Same graft, shifted to a neighbouring child slot.
    pub(crate) fn shifted(&self, index: usize) -> Self {
        Self {
            parent: self.parent,
            offset: Offset::Index(index),
            graft_ancestor: self.graft_ancestor.clone(),
        }
    }
}

fn same_chain(a: Option<&Arc<GraftPoint>>, b: Option<&Arc<GraftPoint>>) -> bool {
    let (mut a, mut b) = (a, b);
    loop {
        match (a, b) {
            (None, None) => return true,
            (Some(x), Some(y)) => {
                if Arc::ptr_eq(x, y) {
                    return true;
                }
                if x.parent != y.parent || x.offset != y.offset {
                    return false;
                }
                a = x.graft_ancestor.as_ref();
                b = y.graft_ancestor.as_ref();
            }
            _ => return false,
        }
    }
}

impl PartialEq for GraftPoint {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent
            && self.offset == other.offset
            && same_chain(self.graft_ancestor.as_ref(), other.graft_ancestor.as_ref())
    }
}

impl Eq for GraftPoint {}

impl Hash for GraftPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut cur = Some(self);
        while let Some(g) = cur {
            g.parent.hash(state);
            g.offset.hash(state);
            cur = g.graft_ancestor.as_deref();
        }
    }
}

/// Identity plus location of a node, valid for one evaluation.
#[derive(Debug, Clone)]
pub struct Pointer<N> {
    node: NodeRef<N>,
    graft_ancestor: Option<Arc<GraftPoint>>,
}

impl<N> Pointer<N> {
    pub fn new(node: NodeRef<N>, graft_ancestor: Option<Arc<GraftPoint>>) -> Self {
        Self {
            node,
            graft_ancestor,
        }
    }

    /// Plain reference into the host document.
    pub fn real(node: N) -> Self {
        Self::new(NodeRef::Real(node), None)
    }

    /// Silhouette at the top of a virtual tree.
    pub fn silhouette(id: SilhouetteId) -> Self {
        Self::new(NodeRef::Silhouette(id), None)
    }

    pub fn is_silhouette(&self) -> bool {
        self.node.is_silhouette()
    }

    pub fn unwrap(&self) -> &NodeRef<N> {
        &self.node
    }

    pub fn into_inner(self) -> NodeRef<N> {
        self.node
    }

    pub fn real_node(&self) -> Option<&N> {
        self.node.as_real()
    }

    pub fn silhouette_id(&self) -> Option<SilhouetteId> {
        self.node.as_silhouette()
    }

    pub fn graft_ancestor(&self) -> Option<&GraftPoint> {
        self.graft_ancestor.as_deref()
    }

    pub(crate) fn graft_handle(&self) -> Option<&Arc<GraftPoint>> {
        self.graft_ancestor.as_ref()
    }
}

impl<N: PartialEq> Pointer<N> {
    /// Two pointers denote the same logical node when the wrapped nodes are identical and
    /// their graft chains agree slot by slot, however the chains were built.
    pub fn same_location(&self, other: &Self) -> bool {
        self.node == other.node
            && same_chain(self.graft_ancestor.as_ref(), other.graft_ancestor.as_ref())
    }
}

impl<N: PartialEq> PartialEq for Pointer<N> {
    fn eq(&self, other: &Self) -> bool {
        self.same_location(other)
    }
}

impl<N: Eq> Eq for Pointer<N> {}

impl<N: Hash> Hash for Pointer<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
        match &self.graft_ancestor {
            Some(g) => {
                1u8.hash(state);
                g.hash(state);
            }
            None => 0u8.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graft(parent: SilhouetteId, index: usize, up: Option<Arc<GraftPoint>>) -> Arc<GraftPoint> {
        Arc::new(GraftPoint::new(parent, Offset::Index(index), up))
    }

    #[test]
    fn independently_built_chains_are_equal() {
        let mut arena: SilhouetteArena<u32> = SilhouetteArena::new();
        let leaf = arena.text("x");
        let inner = arena.element(QName::local("i"), vec![], vec![NodeRef::Silhouette(leaf)]);
        let outer = arena.element(QName::local("o"), vec![], vec![NodeRef::Silhouette(inner)]);

        let a = Pointer::new(
            NodeRef::<u32>::Silhouette(leaf),
            Some(graft(inner, 0, Some(graft(outer, 0, None)))),
        );
        let b = Pointer::new(
            NodeRef::<u32>::Silhouette(leaf),
            Some(graft(inner, 0, Some(graft(outer, 0, None)))),
        );
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn differing_offsets_are_distinct() {
        let mut arena: SilhouetteArena<u32> = SilhouetteArena::new();
        let parent = arena.element(QName::local("p"), vec![], vec![NodeRef::Real(7), NodeRef::Real(7)]);
        let first = Pointer::new(NodeRef::Real(7), Some(graft(parent, 0, None)));
        let second = Pointer::new(NodeRef::Real(7), Some(graft(parent, 1, None)));
        assert_ne!(first, second);
        assert_ne!(first, Pointer::real(7));
    }

    #[test]
    fn with_children_leaves_original_untouched() {
        let mut arena: SilhouetteArena<u32> = SilhouetteArena::new();
        let e = arena.element(QName::local("e"), vec![], vec![]);
        let t = arena.text("t");
        let e2 = arena.with_children(e, vec![NodeRef::Silhouette(t)]).unwrap();
        assert!(arena.get(e).children().is_empty());
        assert_eq!(arena.get(e2).children().len(), 1);
        assert!(arena.with_children(t, vec![]).is_none());
    }
}
