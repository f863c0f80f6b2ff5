use crate::consts::{XML_URI, XMLNS_URI};
use crate::runtime::{Error, ErrorCode};
use core::{fmt, hash::Hash};

pub mod simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    DocumentType,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// Element and document nodes own child lists.
    pub fn is_parent(self) -> bool {
        matches!(self, NodeKind::Element | NodeKind::Document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn new(prefix: Option<&str>, local: impl Into<String>, ns_uri: Option<&str>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
            local: local.into(),
            ns_uri: ns_uri.filter(|u| !u.is_empty()).map(str::to_string),
        }
    }

    /// Name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: None,
        }
    }

    /// Lexical form, `prefix:local` or `local`.
    pub fn prefixed(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }

    /// Prefix/URI pair this name forces onto its element when it is written out.
    /// Unprefixed attribute names never bind anything; unprefixed element names bind
    /// the default namespace. The reserved `xml` and `xmlns` namespaces are always bound.
    pub fn implied_binding(&self, is_attribute: bool) -> Option<(String, String)> {
        if self.is_reserved() {
            return None;
        }
        match (&self.prefix, is_attribute) {
            (Some(p), _) => Some((p.clone(), self.ns_uri.clone().unwrap_or_default())),
            (None, true) => None,
            (None, false) => Some((String::new(), self.ns_uri.clone().unwrap_or_default())),
        }
    }

    fn is_reserved(&self) -> bool {
        matches!(self.prefix.as_deref(), Some("xml" | "xmlns"))
            || matches!(self.ns_uri.as_deref(), Some(XML_URI | XMLNS_URI))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefixed())
    }
}

/// Opaque hint a caller may pass along to the host for index based pruning.
/// It never changes the answer of a navigation call.
pub type Bucket<'a> = Option<&'a str>;

/// Access to the concrete tree the engine evaluates against.
///
/// Navigation is read-only and reports structurally absent relations as `None`.
/// Construction creates detached nodes; only the materializer and the update engine
/// use construction and mutation.
pub trait HostTree: Sized + 'static {
    type Node: Clone + Eq + Hash + fmt::Debug + 'static;

    fn kind(&self, node: &Self::Node) -> NodeKind;
    /// Element and attribute names; processing instructions report their target as local name.
    fn name(&self, node: &Self::Node) -> Option<QName>;
    /// Attribute value or character data. `None` for parent nodes.
    fn value(&self, node: &Self::Node) -> Option<String>;

    /// Owning element for attributes, parent node for everything else.
    fn parent(&self, node: &Self::Node, bucket: Bucket<'_>) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node, bucket: Bucket<'_>) -> Vec<Self::Node>;
    fn attributes(&self, node: &Self::Node, bucket: Bucket<'_>) -> Vec<Self::Node>;
    fn next_sibling(&self, node: &Self::Node, bucket: Bucket<'_>) -> Option<Self::Node>;
    fn previous_sibling(&self, node: &Self::Node, bucket: Bucket<'_>) -> Option<Self::Node>;

    fn first_child(&self, node: &Self::Node, bucket: Bucket<'_>) -> Option<Self::Node> {
        self.children(node, bucket).into_iter().next()
    }

    fn last_child(&self, node: &Self::Node, bucket: Bucket<'_>) -> Option<Self::Node> {
        self.children(node, bucket).pop()
    }

    /// Attribute by lexical (prefixed) name.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<Self::Node> {
        self.attributes(node, None)
            .into_iter()
            .find(|a| self.name(a).is_some_and(|q| q.prefixed() == name))
    }

    fn create_document(&mut self) -> Self::Node;
    fn create_element(&mut self, name: QName) -> Self::Node;
    fn create_attribute(&mut self, name: QName, value: &str) -> Self::Node;
    fn create_text(&mut self, data: &str) -> Self::Node;
    fn create_comment(&mut self, data: &str) -> Self::Node;
    fn create_processing_instruction(&mut self, target: &str, data: &str) -> Self::Node;

    /// Insert `child` under `parent` before `reference`, or append when `reference` is `None`.
    /// A child that already has a parent is moved.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), Error>;
    /// Attach an attribute node, replacing an attribute with the same expanded name.
    fn set_attribute(&mut self, element: &Self::Node, attribute: &Self::Node) -> Result<(), Error>;
    /// Detach a child or attribute from its parent. Detached nodes are left alone.
    fn remove(&mut self, node: &Self::Node) -> Result<(), Error>;
    fn rename(&mut self, node: &Self::Node, name: QName) -> Result<(), Error>;
    fn set_value(&mut self, node: &Self::Node, value: &str) -> Result<(), Error>;

    /// Copy `node` and its subtree into fresh, parentless nodes.
    /// Document-type children are not copied.
    fn deep_clone(&mut self, node: &Self::Node) -> Result<Self::Node, Error> {
        match self.kind(node) {
            NodeKind::Document => {
                let copy = self.create_document();
                for child in self.children(node, None) {
                    if self.kind(&child) == NodeKind::DocumentType {
                        continue;
                    }
                    let child_copy = self.deep_clone(&child)?;
                    self.insert_before(&copy, &child_copy, None)?;
                }
                Ok(copy)
            }
            NodeKind::Element => {
                let name = self
                    .name(node)
                    .ok_or_else(|| Error::host("element without a name"))?;
                let copy = self.create_element(name);
                for attribute in self.attributes(node, None) {
                    let attribute_copy = self.deep_clone(&attribute)?;
                    self.set_attribute(&copy, &attribute_copy)?;
                }
                for child in self.children(node, None) {
                    let child_copy = self.deep_clone(&child)?;
                    self.insert_before(&copy, &child_copy, None)?;
                }
                Ok(copy)
            }
            NodeKind::Attribute => {
                let name = self
                    .name(node)
                    .ok_or_else(|| Error::host("attribute without a name"))?;
                let value = self.value(node).unwrap_or_default();
                Ok(self.create_attribute(name, &value))
            }
            NodeKind::Text => {
                let data = self.value(node).unwrap_or_default();
                Ok(self.create_text(&data))
            }
            NodeKind::Comment => {
                let data = self.value(node).unwrap_or_default();
                Ok(self.create_comment(&data))
            }
            NodeKind::ProcessingInstruction => {
                let target = self.name(node).map(|q| q.local).unwrap_or_default();
                let data = self.value(node).unwrap_or_default();
                Ok(self.create_processing_instruction(&target, &data))
            }
            NodeKind::DocumentType => Err(Error::from_code(
                ErrorCode::XPTY0004,
                "document-type nodes are not part of the data model and cannot be copied",
            )),
        }
    }
}
