use serde::{Deserialize, Serialize};

use crate::model::QName;
use crate::pointer::Pointer;
use crate::runtime::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Delete,
    InsertBefore,
    InsertAfter,
    InsertInto,
    InsertIntoAsFirst,
    InsertIntoAsLast,
    InsertAttributes,
    Rename,
    ReplaceNode,
    ReplaceValue,
    ReplaceElementContent,
    Put,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Delete => "delete",
            UpdateKind::InsertBefore => "insertBefore",
            UpdateKind::InsertAfter => "insertAfter",
            UpdateKind::InsertInto => "insertInto",
            UpdateKind::InsertIntoAsFirst => "insertIntoAsFirst",
            UpdateKind::InsertIntoAsLast => "insertIntoAsLast",
            UpdateKind::InsertAttributes => "insertAttributes",
            UpdateKind::Rename => "rename",
            UpdateKind::ReplaceNode => "replaceNode",
            UpdateKind::ReplaceValue => "replaceValue",
            UpdateKind::ReplaceElementContent => "replaceElementContent",
            UpdateKind::Put => "put",
        }
    }
}

/// One deferred mutation. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingUpdate<N> {
    Delete {
        target: Pointer<N>,
    },
    InsertBefore {
        target: Pointer<N>,
        content: Vec<Pointer<N>>,
    },
    InsertAfter {
        target: Pointer<N>,
        content: Vec<Pointer<N>>,
    },
    InsertInto {
        target: Pointer<N>,
        content: Vec<Pointer<N>>,
    },
    InsertIntoAsFirst {
        target: Pointer<N>,
        content: Vec<Pointer<N>>,
    },
    InsertIntoAsLast {
        target: Pointer<N>,
        content: Vec<Pointer<N>>,
    },
    InsertAttributes {
        target: Pointer<N>,
        content: Vec<Pointer<N>>,
    },
    Rename {
        target: Pointer<N>,
        new_name: QName,
    },
    ReplaceNode {
        target: Pointer<N>,
        replacement: Vec<Pointer<N>>,
    },
    ReplaceValue {
        target: Pointer<N>,
        value: String,
    },
    /// `text` of `None` empties the element.
    ReplaceElementContent {
        target: Pointer<N>,
        text: Option<String>,
    },
    Put {
        node: Pointer<N>,
        uri: String,
    },
}

impl<N> PendingUpdate<N> {
    pub fn delete(target: Pointer<N>) -> Self {
        PendingUpdate::Delete { target }
    }

    pub fn insert_before(target: Pointer<N>, content: Vec<Pointer<N>>) -> Self {
        PendingUpdate::InsertBefore { target, content }
    }

    pub fn insert_after(target: Pointer<N>, content: Vec<Pointer<N>>) -> Self {
        PendingUpdate::InsertAfter { target, content }
    }

    pub fn insert_into(target: Pointer<N>, content: Vec<Pointer<N>>) -> Self {
        PendingUpdate::InsertInto { target, content }
    }

    pub fn insert_into_as_first(target: Pointer<N>, content: Vec<Pointer<N>>) -> Self {
        PendingUpdate::InsertIntoAsFirst { target, content }
    }

    pub fn insert_into_as_last(target: Pointer<N>, content: Vec<Pointer<N>>) -> Self {
        PendingUpdate::InsertIntoAsLast { target, content }
    }

    pub fn insert_attributes(target: Pointer<N>, content: Vec<Pointer<N>>) -> Self {
        PendingUpdate::InsertAttributes { target, content }
    }

    pub fn rename(target: Pointer<N>, new_name: QName) -> Self {
        PendingUpdate::Rename { target, new_name }
    }

    pub fn replace_node(target: Pointer<N>, replacement: Vec<Pointer<N>>) -> Self {
        PendingUpdate::ReplaceNode {
            target,
            replacement,
        }
    }

    pub fn replace_value(target: Pointer<N>, value: impl Into<String>) -> Self {
        PendingUpdate::ReplaceValue {
            target,
            value: value.into(),
        }
    }

    pub fn replace_element_content(target: Pointer<N>, text: Option<String>) -> Self {
        PendingUpdate::ReplaceElementContent { target, text }
    }

    pub fn put(node: Pointer<N>, uri: impl Into<String>) -> Self {
        PendingUpdate::Put {
            node,
            uri: uri.into(),
        }
    }

    pub fn kind(&self) -> UpdateKind {
        match self {
            PendingUpdate::Delete { .. } => UpdateKind::Delete,
            PendingUpdate::InsertBefore { .. } => UpdateKind::InsertBefore,
            PendingUpdate::InsertAfter { .. } => UpdateKind::InsertAfter,
            PendingUpdate::InsertInto { .. } => UpdateKind::InsertInto,
            PendingUpdate::InsertIntoAsFirst { .. } => UpdateKind::InsertIntoAsFirst,
            PendingUpdate::InsertIntoAsLast { .. } => UpdateKind::InsertIntoAsLast,
            PendingUpdate::InsertAttributes { .. } => UpdateKind::InsertAttributes,
            PendingUpdate::Rename { .. } => UpdateKind::Rename,
            PendingUpdate::ReplaceNode { .. } => UpdateKind::ReplaceNode,
            PendingUpdate::ReplaceValue { .. } => UpdateKind::ReplaceValue,
            PendingUpdate::ReplaceElementContent { .. } => UpdateKind::ReplaceElementContent,
            PendingUpdate::Put { .. } => UpdateKind::Put,
        }
    }

    /// The node the primitive changes; for `put`, the node being stored.
    pub fn target(&self) -> &Pointer<N> {
        match self {
            PendingUpdate::Delete { target }
            | PendingUpdate::InsertBefore { target, .. }
            | PendingUpdate::InsertAfter { target, .. }
            | PendingUpdate::InsertInto { target, .. }
            | PendingUpdate::InsertIntoAsFirst { target, .. }
            | PendingUpdate::InsertIntoAsLast { target, .. }
            | PendingUpdate::InsertAttributes { target, .. }
            | PendingUpdate::Rename { target, .. }
            | PendingUpdate::ReplaceNode { target, .. }
            | PendingUpdate::ReplaceValue { target, .. }
            | PendingUpdate::ReplaceElementContent { target, .. } => target,
            PendingUpdate::Put { node, .. } => node,
        }
    }

    /// Insertion content or replacement nodes; empty for the other kinds.
    pub fn content(&self) -> &[Pointer<N>] {
        match self {
            PendingUpdate::InsertBefore { content, .. }
            | PendingUpdate::InsertAfter { content, .. }
            | PendingUpdate::InsertInto { content, .. }
            | PendingUpdate::InsertIntoAsFirst { content, .. }
            | PendingUpdate::InsertIntoAsLast { content, .. }
            | PendingUpdate::InsertAttributes { content, .. } => content,
            PendingUpdate::ReplaceNode { replacement, .. } => replacement,
            _ => &[],
        }
    }

    /// Plain-data form for handing the primitive across a boundary. Every pointer goes
    /// through `resolve`, typically materialization followed by serialization.
    pub fn to_transferable<T, F>(&self, mut resolve: F) -> Result<TransferableUpdate<T>, Error>
    where
        F: FnMut(&Pointer<N>) -> Result<T, Error>,
    {
        Ok(match self {
            PendingUpdate::Delete { target } => TransferableUpdate::Delete {
                target: resolve(target)?,
            },
            PendingUpdate::InsertBefore { target, content } => TransferableUpdate::InsertBefore {
                content: resolve_all(content, &mut resolve)?,
                target: resolve(target)?,
            },
            PendingUpdate::InsertAfter { target, content } => TransferableUpdate::InsertAfter {
                content: resolve_all(content, &mut resolve)?,
                target: resolve(target)?,
            },
            PendingUpdate::InsertInto { target, content } => TransferableUpdate::InsertInto {
                content: resolve_all(content, &mut resolve)?,
                target: resolve(target)?,
            },
            PendingUpdate::InsertIntoAsFirst { target, content } => {
                TransferableUpdate::InsertIntoAsFirst {
                    content: resolve_all(content, &mut resolve)?,
                    target: resolve(target)?,
                }
            }
            PendingUpdate::InsertIntoAsLast { target, content } => {
                TransferableUpdate::InsertIntoAsLast {
                    content: resolve_all(content, &mut resolve)?,
                    target: resolve(target)?,
                }
            }
            PendingUpdate::InsertAttributes { target, content } => {
                TransferableUpdate::InsertAttributes {
                    content: resolve_all(content, &mut resolve)?,
                    target: resolve(target)?,
                }
            }
            PendingUpdate::Rename { target, new_name } => TransferableUpdate::Rename {
                target: resolve(target)?,
                new_name: TransferableName::from(new_name),
            },
            PendingUpdate::ReplaceNode {
                target,
                replacement,
            } => TransferableUpdate::ReplaceNode {
                replacement: resolve_all(replacement, &mut resolve)?,
                target: resolve(target)?,
            },
            PendingUpdate::ReplaceValue { target, value } => TransferableUpdate::ReplaceValue {
                target: resolve(target)?,
                value: value.clone(),
            },
            PendingUpdate::ReplaceElementContent { target, text } => {
                TransferableUpdate::ReplaceElementContent {
                    target: resolve(target)?,
                    text: text.clone(),
                }
            }
            PendingUpdate::Put { node, uri } => TransferableUpdate::Put {
                node: resolve(node)?,
                uri: uri.clone(),
            },
        })
    }
}

fn resolve_all<N, T, F>(nodes: &[Pointer<N>], resolve: &mut F) -> Result<Vec<T>, Error>
where
    F: FnMut(&Pointer<N>) -> Result<T, Error>,
{
    nodes.iter().map(|n| resolve(n)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferableName {
    pub prefix: Option<String>,
    #[serde(rename = "namespaceURI")]
    pub namespace_uri: Option<String>,
    #[serde(rename = "localName")]
    pub local_name: String,
}

impl From<&QName> for TransferableName {
    fn from(q: &QName) -> Self {
        Self {
            prefix: q.prefix.clone(),
            namespace_uri: q.ns_uri.clone(),
            local_name: q.local.clone(),
        }
    }
}

/// Serializable form of a [`PendingUpdate`], tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransferableUpdate<T> {
    Delete {
        target: T,
    },
    InsertBefore {
        target: T,
        content: Vec<T>,
    },
    InsertAfter {
        target: T,
        content: Vec<T>,
    },
    InsertInto {
        target: T,
        content: Vec<T>,
    },
    InsertIntoAsFirst {
        target: T,
        content: Vec<T>,
    },
    InsertIntoAsLast {
        target: T,
        content: Vec<T>,
    },
    InsertAttributes {
        target: T,
        content: Vec<T>,
    },
    Rename {
        target: T,
        #[serde(rename = "newName")]
        new_name: TransferableName,
    },
    ReplaceNode {
        target: T,
        replacement: Vec<T>,
    },
    ReplaceValue {
        target: T,
        #[serde(rename = "string-value")]
        value: String,
    },
    ReplaceElementContent {
        target: T,
        text: Option<String>,
    },
    Put {
        node: T,
        uri: String,
    },
}

impl<T> TransferableUpdate<T> {
    pub fn kind(&self) -> UpdateKind {
        match self {
            TransferableUpdate::Delete { .. } => UpdateKind::Delete,
            TransferableUpdate::InsertBefore { .. } => UpdateKind::InsertBefore,
            TransferableUpdate::InsertAfter { .. } => UpdateKind::InsertAfter,
            TransferableUpdate::InsertInto { .. } => UpdateKind::InsertInto,
            TransferableUpdate::InsertIntoAsFirst { .. } => UpdateKind::InsertIntoAsFirst,
            TransferableUpdate::InsertIntoAsLast { .. } => UpdateKind::InsertIntoAsLast,
            TransferableUpdate::InsertAttributes { .. } => UpdateKind::InsertAttributes,
            TransferableUpdate::Rename { .. } => UpdateKind::Rename,
            TransferableUpdate::ReplaceNode { .. } => UpdateKind::ReplaceNode,
            TransferableUpdate::ReplaceValue { .. } => UpdateKind::ReplaceValue,
            TransferableUpdate::ReplaceElementContent { .. } => UpdateKind::ReplaceElementContent,
            TransferableUpdate::Put { .. } => UpdateKind::Put,
        }
    }
}
