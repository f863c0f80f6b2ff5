//! Arena-backed in-memory host tree used in tests and quick prototypes.
//!
//! Nodes live in one `Vec` per document and are addressed by `NodeId`. Detached nodes
//! (freshly created, removed, or replaced) stay in the arena with no parent.
//!
//! Example:
//! ```
//! use graftpath::model::simple::{SimpleDocument, elem, text, attr};
//! use graftpath::HostTree;
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let mut document = SimpleDocument::new();
//! let root = document.build(
//!     elem("root")
//!         .attr(attr("id", "r"))
//!         .child(elem("child").child(text("Hello")))
//!         .child(elem("child").attr(attr("world", "yes"))),
//! );
//!
//! assert_eq!(document.name(&root).unwrap().local, "root");
//! assert_eq!(document.children(&root, None).len(), 2);
//! assert_eq!(
//!     document.to_xml(root),
//!     r#"<root id="r"><child>Hello</child><child world="yes"/></root>"#
//! );
//! ```
use crate::model::{Bucket, HostTree, NodeKind, QName};
use crate::runtime::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeRec {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct SimpleDocument {
    nodes: Vec<NodeRec>,
}

impl SimpleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, kind: NodeKind, name: Option<QName>, value: Option<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeRec {
            kind,
            name,
            value,
            parent: None,
            children: Vec::new(),
            attrs: Vec::new(),
        });
        id
    }

    fn rec(&self, id: NodeId) -> &NodeRec {
        &self.nodes[id.0]
    }

    fn rec_mut(&mut self, id: NodeId) -> &mut NodeRec {
        &mut self.nodes[id.0]
    }

    fn check(&self, id: NodeId) -> Result<(), Error> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(Error::host(format!("node {} does not belong to this document", id.0)))
        }
    }

    /// Materialize a builder description into the arena and return its root.
    pub fn build(&mut self, spec: impl Into<NodeSpec>) -> NodeId {
        match spec.into() {
            NodeSpec::Document(children) => {
                let id = self.push(NodeKind::Document, None, None);
                for child in children {
                    let c = self.build(child);
                    self.rec_mut(c).parent = Some(id);
                    self.rec_mut(id).children.push(c);
                }
                id
            }
            NodeSpec::DocumentType(name) => {
                self.push(NodeKind::DocumentType, Some(QName::local(name)), None)
            }
            NodeSpec::Element {
                name,
                attrs,
                children,
            } => {
                let id = self.push(NodeKind::Element, Some(name), None);
                for a in attrs {
                    let aid = self.push(NodeKind::Attribute, Some(a.name), Some(a.value));
                    self.rec_mut(aid).parent = Some(id);
                    self.rec_mut(id).attrs.push(aid);
                }
                for child in children {
                    let c = self.build(child);
                    self.rec_mut(c).parent = Some(id);
                    self.rec_mut(id).children.push(c);
                }
                id
            }
            NodeSpec::Attribute(a) => self.push(NodeKind::Attribute, Some(a.name), Some(a.value)),
            NodeSpec::Text(v) => self.push(NodeKind::Text, None, Some(v)),
            NodeSpec::Comment(v) => self.push(NodeKind::Comment, None, Some(v)),
            NodeSpec::ProcessingInstruction { target, data } => self.push(
                NodeKind::ProcessingInstruction,
                Some(QName::local(target)),
                Some(data),
            ),
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.rec(id).parent else {
            return;
        };
        let is_attr = self.rec(id).kind == NodeKind::Attribute;
        let p = self.rec_mut(parent);
        if is_attr {
            p.attrs.retain(|a| *a != id);
        } else {
            p.children.retain(|c| *c != id);
        }
        self.rec_mut(id).parent = None;
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.rec(node).parent {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    fn sibling(&self, node: NodeId, forward: bool) -> Option<NodeId> {
        let rec = self.rec(node);
        if rec.kind == NodeKind::Attribute {
            return None;
        }
        let siblings = &self.rec(rec.parent?).children;
        let pos = siblings.iter().position(|c| *c == node)?;
        if forward {
            siblings.get(pos + 1).copied()
        } else {
            pos.checked_sub(1).and_then(|i| siblings.get(i).copied())
        }
    }

    /// Serialize a subtree. Intended for assertions, not for round-tripping documents.
    pub fn to_xml(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_xml(node, &mut out);
        out
    }

    fn write_xml(&self, node: NodeId, out: &mut String) {
        let rec = self.rec(node);
        match rec.kind {
            NodeKind::Document => {
                for c in &rec.children {
                    self.write_xml(*c, out);
                }
            }
            NodeKind::DocumentType => {
                let name = rec.name.as_ref().map(QName::prefixed).unwrap_or_default();
                out.push_str(&format!("<!DOCTYPE {}>", name));
            }
            NodeKind::Element => {
                let name = rec.name.as_ref().map(QName::prefixed).unwrap_or_default();
                out.push('<');
                out.push_str(&name);
                for a in &rec.attrs {
                    out.push(' ');
                    self.write_xml(*a, out);
                }
                if rec.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for c in &rec.children {
                        self.write_xml(*c, out);
                    }
                    out.push_str(&format!("</{}>", name));
                }
            }
            NodeKind::Attribute => {
                let name = rec.name.as_ref().map(QName::prefixed).unwrap_or_default();
                let value = rec.value.as_deref().unwrap_or_default();
                out.push_str(&format!("{}=\"{}\"", name, escape(value, true)));
            }
            NodeKind::Text => out.push_str(&escape(rec.value.as_deref().unwrap_or_default(), false)),
            NodeKind::Comment => {
                out.push_str(&format!("<!--{}-->", rec.value.as_deref().unwrap_or_default()));
            }
            NodeKind::ProcessingInstruction => {
                let target = rec.name.as_ref().map(|q| q.local.as_str()).unwrap_or_default();
                match rec.value.as_deref() {
                    Some(data) if !data.is_empty() => {
                        out.push_str(&format!("<?{} {}?>", target, data));
                    }
                    _ => out.push_str(&format!("<?{}?>", target)),
                }
            }
        }
    }
}

fn escape(s: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl HostTree for SimpleDocument {
    type Node = NodeId;

    fn kind(&self, node: &NodeId) -> NodeKind {
        self.rec(*node).kind
    }

    fn name(&self, node: &NodeId) -> Option<QName> {
        let rec = self.rec(*node);
        match rec.kind {
            NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction => {
                rec.name.clone()
            }
            _ => None,
        }
    }

    fn value(&self, node: &NodeId) -> Option<String> {
        self.rec(*node).value.clone()
    }

    fn parent(&self, node: &NodeId, _bucket: Bucket<'_>) -> Option<NodeId> {
        self.rec(*node).parent
    }

    fn children(&self, node: &NodeId, _bucket: Bucket<'_>) -> Vec<NodeId> {
        self.rec(*node).children.clone()
    }

    fn attributes(&self, node: &NodeId, _bucket: Bucket<'_>) -> Vec<NodeId> {
        self.rec(*node).attrs.clone()
    }

    fn next_sibling(&self, node: &NodeId, _bucket: Bucket<'_>) -> Option<NodeId> {
        self.sibling(*node, true)
    }

    fn previous_sibling(&self, node: &NodeId, _bucket: Bucket<'_>) -> Option<NodeId> {
        self.sibling(*node, false)
    }

    fn first_child(&self, node: &NodeId, _bucket: Bucket<'_>) -> Option<NodeId> {
        self.rec(*node).children.first().copied()
    }

    fn last_child(&self, node: &NodeId, _bucket: Bucket<'_>) -> Option<NodeId> {
        self.rec(*node).children.last().copied()
    }

    fn create_document(&mut self) -> NodeId {
        self.push(NodeKind::Document, None, None)
    }

    fn create_element(&mut self, name: QName) -> NodeId {
        self.push(NodeKind::Element, Some(name), None)
    }

    fn create_attribute(&mut self, name: QName, value: &str) -> NodeId {
        self.push(NodeKind::Attribute, Some(name), Some(value.to_string()))
    }

    fn create_text(&mut self, data: &str) -> NodeId {
        self.push(NodeKind::Text, None, Some(data.to_string()))
    }

    fn create_comment(&mut self, data: &str) -> NodeId {
        self.push(NodeKind::Comment, None, Some(data.to_string()))
    }

    fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        self.push(
            NodeKind::ProcessingInstruction,
            Some(QName::local(target)),
            Some(data.to_string()),
        )
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), Error> {
        self.check(*parent)?;
        self.check(*child)?;
        if !self.kind(parent).is_parent() {
            return Err(Error::host("only elements and documents accept children"));
        }
        if matches!(self.kind(child), NodeKind::Attribute | NodeKind::Document) {
            return Err(Error::host("attributes and documents cannot be inserted as children"));
        }
        if self.is_ancestor_or_self(*child, *parent) {
            return Err(Error::host("cannot insert a node into its own subtree"));
        }
        if let Some(r) = reference {
            if r == child {
                return Ok(());
            }
            if self.rec(*r).parent != Some(*parent) || self.kind(r) == NodeKind::Attribute {
                return Err(Error::host("reference node is not a child of the parent"));
            }
        }
        self.detach(*child);
        let pos = match reference {
            Some(r) => self
                .rec(*parent)
                .children
                .iter()
                .position(|c| c == r)
                .ok_or_else(|| Error::host("reference node vanished during insert"))?,
            None => self.rec(*parent).children.len(),
        };
        self.rec_mut(*parent).children.insert(pos, *child);
        self.rec_mut(*child).parent = Some(*parent);
        Ok(())
    }

    fn set_attribute(&mut self, element: &NodeId, attribute: &NodeId) -> Result<(), Error> {
        self.check(*element)?;
        self.check(*attribute)?;
        if self.kind(element) != NodeKind::Element {
            return Err(Error::host("attributes can only be set on elements"));
        }
        if self.kind(attribute) != NodeKind::Attribute {
            return Err(Error::host("set_attribute expects an attribute node"));
        }
        self.detach(*attribute);
        let name = self.rec(*attribute).name.clone();
        let clash: Vec<NodeId> = self
            .rec(*element)
            .attrs
            .iter()
            .copied()
            .filter(|a| {
                let other = self.rec(*a).name.as_ref();
                match (other, name.as_ref()) {
                    (Some(o), Some(n)) => o.local == n.local && o.ns_uri == n.ns_uri,
                    _ => false,
                }
            })
            .collect();
        for old in clash {
            self.detach(old);
        }
        self.rec_mut(*element).attrs.push(*attribute);
        self.rec_mut(*attribute).parent = Some(*element);
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<(), Error> {
        self.check(*node)?;
        self.detach(*node);
        Ok(())
    }

    fn rename(&mut self, node: &NodeId, name: QName) -> Result<(), Error> {
        self.check(*node)?;
        match self.kind(node) {
            NodeKind::Element | NodeKind::Attribute => {
                self.rec_mut(*node).name = Some(name);
                Ok(())
            }
            NodeKind::ProcessingInstruction => {
                self.rec_mut(*node).name = Some(QName::local(name.local));
                Ok(())
            }
            other => Err(Error::host(format!("cannot rename a {:?} node", other))),
        }
    }

    fn set_value(&mut self, node: &NodeId, value: &str) -> Result<(), Error> {
        self.check(*node)?;
        match self.kind(node) {
            NodeKind::Attribute
            | NodeKind::Text
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction => {
                self.rec_mut(*node).value = Some(value.to_string());
                Ok(())
            }
            other => Err(Error::host(format!("cannot set the value of a {:?} node", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrSpec {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    Document(Vec<NodeSpec>),
    DocumentType(String),
    Element {
        name: QName,
        attrs: Vec<AttrSpec>,
        children: Vec<NodeSpec>,
    },
    Attribute(AttrSpec),
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

pub struct ElementBuilder {
    name: QName,
    attrs: Vec<AttrSpec>,
    children: Vec<NodeSpec>,
}

impl ElementBuilder {
    pub fn attr(mut self, attr: AttrSpec) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn attrs<I: IntoIterator<Item = AttrSpec>>(mut self, attrs: I) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn child(mut self, child: impl Into<NodeSpec>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, C>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NodeSpec>,
    {
        self.children.extend(it.into_iter().map(Into::into));
        self
    }
}

pub struct DocumentBuilder {
    children: Vec<NodeSpec>,
}

impl DocumentBuilder {
    pub fn child(mut self, child: impl Into<NodeSpec>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl From<ElementBuilder> for NodeSpec {
    fn from(b: ElementBuilder) -> Self {
        NodeSpec::Element {
            name: b.name,
            attrs: b.attrs,
            children: b.children,
        }
    }
}

impl From<DocumentBuilder> for NodeSpec {
    fn from(b: DocumentBuilder) -> Self {
        NodeSpec::Document(b.children)
    }
}

impl From<AttrSpec> for NodeSpec {
    fn from(a: AttrSpec) -> Self {
        NodeSpec::Attribute(a)
    }
}

// Convenience helper functions for concise test code
pub fn doc() -> DocumentBuilder {
    DocumentBuilder {
        children: Vec::new(),
    }
}
pub fn elem(name: &str) -> ElementBuilder {
    elem_q(QName::local(name))
}
pub fn elem_ns(prefix: &str, local: &str, uri: &str) -> ElementBuilder {
    elem_q(QName::new(Some(prefix), local, Some(uri)))
}
fn elem_q(name: QName) -> ElementBuilder {
    ElementBuilder {
        name,
        attrs: Vec::new(),
        children: Vec::new(),
    }
}
pub fn attr(name: &str, value: &str) -> AttrSpec {
    AttrSpec {
        name: QName::local(name),
        value: value.to_string(),
    }
}
pub fn attr_ns(prefix: &str, local: &str, uri: &str, value: &str) -> AttrSpec {
    AttrSpec {
        name: QName::new(Some(prefix), local, Some(uri)),
        value: value.to_string(),
    }
}
pub fn text(v: &str) -> NodeSpec {
    NodeSpec::Text(v.to_string())
}
pub fn comment(v: &str) -> NodeSpec {
    NodeSpec::Comment(v.to_string())
}
pub fn pi(target: &str, data: &str) -> NodeSpec {
    NodeSpec::ProcessingInstruction {
        target: target.to_string(),
        data: data.to_string(),
    }
}
pub fn doctype(name: &str) -> NodeSpec {
    NodeSpec::DocumentType(name.to_string())
}
