//! Navigation over pointers.
//!
//! [`NodeFacade`] answers every axis question for both real and silhouette pointers and
//! hides document-type nodes, which are not part of the data model. Structurally absent
//! relations are `None`; `Err` is reserved for a broken graft chain.
use std::sync::Arc;

use crate::model::{Bucket, HostTree, NodeKind, QName};
use crate::pointer::{GraftPoint, NodeRef, Offset, Pointer, SilhouetteArena, SilhouetteId};
use crate::runtime::Error;

type Ptr<H> = Pointer<<H as HostTree>::Node>;

pub struct NodeFacade<'a, H: HostTree> {
    host: &'a H,
    arena: &'a SilhouetteArena<H::Node>,
}

impl<H: HostTree> Clone for NodeFacade<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: HostTree> Copy for NodeFacade<'_, H> {}

impl<'a, H: HostTree> NodeFacade<'a, H> {
    pub fn new(host: &'a H, arena: &'a SilhouetteArena<H::Node>) -> Self {
        Self { host, arena }
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn arena(&self) -> &'a SilhouetteArena<H::Node> {
        self.arena
    }

    // ----- projections on bare node references -----

    pub(crate) fn kind_of(&self, node: &NodeRef<H::Node>) -> NodeKind {
        match node {
            NodeRef::Real(n) => self.host.kind(n),
            NodeRef::Silhouette(id) => self.arena.get(*id).kind(),
        }
    }

    pub(crate) fn name_of(&self, node: &NodeRef<H::Node>) -> Option<QName> {
        match node {
            NodeRef::Real(n) => self.host.name(n),
            NodeRef::Silhouette(id) => self.arena.get(*id).name(),
        }
    }

    pub(crate) fn value_of(&self, node: &NodeRef<H::Node>) -> Option<String> {
        match node {
            NodeRef::Real(n) => self.host.value(n),
            NodeRef::Silhouette(id) => self.arena.get(*id).data().map(str::to_string),
        }
    }

    /// The entry of silhouette `parent` a graft offset points at.
    fn slot(&self, parent: SilhouetteId, offset: &Offset) -> Option<&'a NodeRef<H::Node>> {
        let sil = self.arena.get(parent);
        match offset {
            Offset::Index(i) => sil.children().get(*i),
            Offset::Attribute(name) => sil
                .attributes()
                .iter()
                .find(|a| self.name_of(a).as_ref() == Some(name)),
        }
    }

    /// True when the pointer is the entry its graft point names, as opposed to a real
    /// descendant of that entry carrying the graft along.
    fn occupies(&self, node: &NodeRef<H::Node>, graft: &GraftPoint) -> bool {
        self.slot(graft.parent, &graft.offset)
            .is_some_and(|entry| entry == node)
    }

    fn is_visible(&self, node: &H::Node) -> bool {
        self.host.kind(node) != NodeKind::DocumentType
    }

    /// Whether a silhouette child slot holds a node navigation may expose.
    pub(crate) fn slot_visible(&self, slot: &NodeRef<H::Node>) -> bool {
        match slot {
            NodeRef::Real(node) => self.is_visible(node),
            NodeRef::Silhouette(_) => true,
        }
    }

    fn graft_child(parent: SilhouetteId, offset: Offset, up: Option<&Arc<GraftPoint>>) -> Arc<GraftPoint> {
        Arc::new(GraftPoint::new(parent, offset, up.cloned()))
    }

    // ----- axes -----

    pub fn child_nodes(&self, ptr: &Ptr<H>, bucket: Bucket<'_>) -> Vec<Ptr<H>> {
        match ptr.unwrap() {
            NodeRef::Silhouette(id) => self
                .arena
                .get(*id)
                .children()
                .iter()
                .enumerate()
                .filter(|(_, child)| self.slot_visible(child))
                .map(|(i, child)| {
                    Pointer::new(
                        child.clone(),
                        Some(Self::graft_child(*id, Offset::Index(i), ptr.graft_handle())),
                    )
                })
                .collect(),
            NodeRef::Real(node) => self
                .host
                .children(node, bucket)
                .into_iter()
                .filter(|c| self.is_visible(c))
                .map(|c| Pointer::new(NodeRef::Real(c), ptr.graft_handle().cloned()))
                .collect(),
        }
    }

    pub fn first_child(&self, ptr: &Ptr<H>, bucket: Bucket<'_>) -> Option<Ptr<H>> {
        match ptr.unwrap() {
            NodeRef::Silhouette(id) => {
                let (index, child) = self
                    .arena
                    .get(*id)
                    .children()
                    .iter()
                    .enumerate()
                    .find(|(_, child)| self.slot_visible(child))?;
                Some(Pointer::new(
                    child.clone(),
                    Some(Self::graft_child(*id, Offset::Index(index), ptr.graft_handle())),
                ))
            }
            NodeRef::Real(node) => {
                let mut cur = self.host.first_child(node, bucket);
                while let Some(c) = cur.as_ref().filter(|c| !self.is_visible(c)) {
                    cur = self.host.next_sibling(c, bucket);
                }
                cur.map(|c| Pointer::new(NodeRef::Real(c), ptr.graft_handle().cloned()))
            }
        }
    }

    pub fn last_child(&self, ptr: &Ptr<H>, bucket: Bucket<'_>) -> Option<Ptr<H>> {
        match ptr.unwrap() {
            NodeRef::Silhouette(id) => {
                let (index, child) = self
                    .arena
                    .get(*id)
                    .children()
                    .iter()
                    .enumerate()
                    .rfind(|(_, child)| self.slot_visible(child))?;
                Some(Pointer::new(
                    child.clone(),
                    Some(Self::graft_child(*id, Offset::Index(index), ptr.graft_handle())),
                ))
            }
            NodeRef::Real(node) => {
                let mut cur = self.host.last_child(node, bucket);
                while let Some(c) = cur.as_ref().filter(|c| !self.is_visible(c)) {
                    cur = self.host.previous_sibling(c, bucket);
                }
                cur.map(|c| Pointer::new(NodeRef::Real(c), ptr.graft_handle().cloned()))
            }
        }
    }

    pub fn next_sibling(&self, ptr: &Ptr<H>, bucket: Bucket<'_>) -> Result<Option<Ptr<H>>, Error> {
        self.sibling(ptr, bucket, true)
    }

    pub fn previous_sibling(
        &self,
        ptr: &Ptr<H>,
        bucket: Bucket<'_>,
    ) -> Result<Option<Ptr<H>>, Error> {
        self.sibling(ptr, bucket, false)
    }

    fn sibling(&self, ptr: &Ptr<H>, bucket: Bucket<'_>, forward: bool) -> Result<Option<Ptr<H>>, Error> {
        let node = ptr.unwrap();
        if let Some(graft) = ptr.graft_ancestor()
            && self.occupies(node, graft)
        {
            let Offset::Index(index) = graft.offset else {
                return Ok(None);
            };
            let siblings = self.arena.get(graft.parent).children();
            let found = if forward {
                siblings
                    .iter()
                    .enumerate()
                    .skip(index.saturating_add(1))
                    .find(|(_, s)| self.slot_visible(s))
            } else {
                siblings
                    .iter()
                    .enumerate()
                    .take(index)
                    .rfind(|(_, s)| self.slot_visible(s))
            };
            return Ok(found
                .map(|(i, s)| Pointer::new(s.clone(), Some(Arc::new(graft.shifted(i))))));
        }
        let real = match node {
            NodeRef::Real(n) => n,
            NodeRef::Silhouette(_) if ptr.graft_ancestor().is_none() => return Ok(None),
            NodeRef::Silhouette(id) => {
                return Err(Error::internal(format!(
                    "silhouette {} is not reachable through its graft point",
                    id.index()
                )));
            }
        };
        if self.host.kind(real) == NodeKind::Attribute {
            return Ok(None);
        }
        let mut cur = real.clone();
        loop {
            let next = if forward {
                self.host.next_sibling(&cur, bucket)
            } else {
                self.host.previous_sibling(&cur, bucket)
            };
            match next {
                Some(n) if self.is_visible(&n) => {
                    return Ok(Some(Pointer::new(
                        NodeRef::Real(n),
                        ptr.graft_handle().cloned(),
                    )));
                }
                Some(n) => cur = n,
                None => return Ok(None),
            }
        }
    }

    pub fn parent_node(&self, ptr: &Ptr<H>, bucket: Bucket<'_>) -> Result<Option<Ptr<H>>, Error> {
        let node = ptr.unwrap();
        let Some(graft) = ptr.graft_ancestor() else {
            return Ok(match node {
                NodeRef::Silhouette(_) => None,
                NodeRef::Real(n) => self
                    .host
                    .parent(n, bucket)
                    .map(|p| Pointer::new(NodeRef::Real(p), None)),
            });
        };
        if self.occupies(node, graft) {
            return Ok(Some(Pointer::new(
                NodeRef::Silhouette(graft.parent),
                graft.graft_ancestor.clone(),
            )));
        }
        match node {
            NodeRef::Silhouette(id) => Err(Error::internal(format!(
                "silhouette {} does not occupy slot {:?} of silhouette {}",
                id.index(),
                graft.offset,
                graft.parent.index()
            ))),
            // A real descendant of a spliced node: its real parent carries the same graft.
            NodeRef::Real(n) => Ok(self
                .host
                .parent(n, bucket)
                .map(|p| Pointer::new(NodeRef::Real(p), ptr.graft_handle().cloned()))),
        }
    }

    pub fn all_attributes(&self, ptr: &Ptr<H>, bucket: Bucket<'_>) -> Vec<Ptr<H>> {
        match ptr.unwrap() {
            NodeRef::Silhouette(id) => self
                .arena
                .get(*id)
                .attributes()
                .iter()
                .filter_map(|a| {
                    let name = self.name_of(a)?;
                    Some(Pointer::new(
                        a.clone(),
                        Some(Self::graft_child(*id, Offset::Attribute(name), ptr.graft_handle())),
                    ))
                })
                .collect(),
            NodeRef::Real(node) if self.host.kind(node) == NodeKind::Element => self
                .host
                .attributes(node, bucket)
                .into_iter()
                .map(|a| Pointer::new(NodeRef::Real(a), ptr.graft_handle().cloned()))
                .collect(),
            NodeRef::Real(_) => Vec::new(),
        }
    }

    /// Attribute value by lexical name.
    pub fn attribute(&self, ptr: &Ptr<H>, name: &str) -> Option<String> {
        match ptr.unwrap() {
            NodeRef::Real(node) => self
                .host
                .attribute(node, name)
                .and_then(|a| self.host.value(&a)),
            NodeRef::Silhouette(_) => self
                .attribute_node(ptr, name)
                .and_then(|a| self.value_of(a.unwrap())),
        }
    }

    pub fn attribute_node(&self, ptr: &Ptr<H>, name: &str) -> Option<Ptr<H>> {
        self.all_attributes(ptr, None)
            .into_iter()
            .find(|a| self.qname(a).is_some_and(|q| q.prefixed() == name))
    }

    // ----- projections -----

    pub fn node_kind(&self, ptr: &Ptr<H>) -> NodeKind {
        self.kind_of(ptr.unwrap())
    }

    pub fn qname(&self, ptr: &Ptr<H>) -> Option<QName> {
        self.name_of(ptr.unwrap())
    }

    pub fn node_name(&self, ptr: &Ptr<H>) -> Option<String> {
        self.qname(ptr).map(|q| q.prefixed())
    }

    pub fn local_name(&self, ptr: &Ptr<H>) -> Option<String> {
        self.qname(ptr).map(|q| q.local)
    }

    pub fn namespace_uri(&self, ptr: &Ptr<H>) -> Option<String> {
        self.qname(ptr).and_then(|q| q.ns_uri)
    }

    pub fn prefix(&self, ptr: &Ptr<H>) -> Option<String> {
        self.qname(ptr).and_then(|q| q.prefix)
    }

    /// Attribute value or character data; empty for parent nodes.
    pub fn data(&self, ptr: &Ptr<H>) -> String {
        self.value_of(ptr.unwrap()).unwrap_or_default()
    }

    pub fn target(&self, ptr: &Ptr<H>) -> Option<String> {
        match self.node_kind(ptr) {
            NodeKind::ProcessingInstruction => self.local_name(ptr),
            _ => None,
        }
    }
}
