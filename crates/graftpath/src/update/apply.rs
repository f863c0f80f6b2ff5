use std::collections::HashSet;
use std::sync::Arc;

use crate::facade::NodeFacade;
use crate::materialize::Materializer;
use crate::model::{HostTree, NodeKind, QName};
use crate::pointer::{Pointer, SilhouetteArena};
use crate::runtime::{Error, ErrorCode, ErrorSource, EvaluationOptions};

use super::primitive::{PendingUpdate, UpdateKind};
use super::pul::{PendingUpdateList, compatibility_check};

/// A primitive whose preconditions hold, with its content already built as detached
/// host nodes.
#[derive(Debug)]
enum Prepared<N> {
    InsertInto(N, Vec<N>),
    InsertIntoAsFirst(N, Vec<N>),
    InsertIntoAsLast(N, Vec<N>),
    InsertBefore(N, Vec<N>),
    InsertAfter(N, Vec<N>),
    InsertAttributes(N, Vec<N>),
    Rename(N, QName),
    ReplaceNode(N, Vec<N>),
    ReplaceValue(N, String),
    ReplaceElementContent(N, Option<String>),
    Delete(N),
}

impl<N> Prepared<N> {
    /// Application stage. Stages run in ascending order; primitive order holds within one.
    fn stage(&self) -> u8 {
        match self {
            Prepared::InsertInto(..)
            | Prepared::InsertAttributes(..)
            | Prepared::ReplaceValue(..)
            | Prepared::Rename(..) => 0,
            Prepared::InsertBefore(..)
            | Prepared::InsertAfter(..)
            | Prepared::InsertIntoAsFirst(..)
            | Prepared::InsertIntoAsLast(..) => 1,
            Prepared::ReplaceNode(..) => 2,
            Prepared::ReplaceElementContent(..) => 3,
            Prepared::Delete(..) => 4,
        }
    }
}

fn is_child_kind(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Element | NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction
    )
}

fn type_error(code: ErrorCode, kind: UpdateKind, detail: impl core::fmt::Display) -> Error {
    Error::from_code(code, format!("{}: {}", kind.as_str(), detail))
}

struct Preparer<'a, H: HostTree> {
    host: &'a mut H,
    arena: &'a SilhouetteArena<H::Node>,
    materializer: &'a mut Materializer<H::Node>,
    options: &'a EvaluationOptions,
    used: HashSet<H::Node>,
}

impl<H: HostTree> Preparer<'_, H> {
    fn target(&self, kind: UpdateKind, ptr: &Pointer<H::Node>) -> Result<H::Node, Error> {
        match ptr.real_node() {
            Some(node) if ptr.graft_ancestor().is_none() => Ok(node.clone()),
            _ => Err(Error::from_code(
                ErrorCode::UPD0001,
                format!("{}: target is not a node of the host document", kind.as_str()),
            )),
        }
    }

    /// Build one content pointer into a detached host node that is safe to attach.
    fn content_node(&mut self, ptr: &Pointer<H::Node>) -> Result<H::Node, Error> {
        let node = match ptr.real_node() {
            Some(real) if ptr.graft_ancestor().is_none() => {
                if self.options.copy_inserted_content {
                    self.host.deep_clone(real)?
                } else {
                    real.clone()
                }
            }
            _ => {
                let built = self.materializer.materialize(&mut *self.host, self.arena, ptr)?;
                if self.host.parent(&built, None).is_some() || self.used.contains(&built) {
                    self.host.deep_clone(&built)?
                } else {
                    built
                }
            }
        };
        self.used.insert(node.clone());
        Ok(node)
    }

    /// Content for child positions. Document nodes contribute their children.
    fn child_content(
        &mut self,
        kind: UpdateKind,
        content: &[Pointer<H::Node>],
    ) -> Result<Vec<H::Node>, Error> {
        let mut out = Vec::with_capacity(content.len());
        for ptr in content {
            let node = self.content_node(ptr)?;
            match self.host.kind(&node) {
                NodeKind::Attribute => {
                    return Err(type_error(
                        ErrorCode::XUTY0004,
                        kind,
                        "attribute nodes cannot be inserted as children",
                    ));
                }
                NodeKind::Document => out.extend(
                    self.host
                        .children(&node, None)
                        .into_iter()
                        .filter(|c| self.host.kind(c) != NodeKind::DocumentType),
                ),
                NodeKind::DocumentType => {
                    return Err(type_error(
                        ErrorCode::XPTY0004,
                        kind,
                        "document-type nodes cannot be inserted",
                    ));
                }
                _ => out.push(node),
            }
        }
        Ok(out)
    }

    fn attribute_content(
        &mut self,
        kind: UpdateKind,
        content: &[Pointer<H::Node>],
    ) -> Result<Vec<H::Node>, Error> {
        let mut out = Vec::with_capacity(content.len());
        for ptr in content {
            let node = self.content_node(ptr)?;
            if self.host.kind(&node) != NodeKind::Attribute {
                return Err(type_error(
                    ErrorCode::XPTY0004,
                    kind,
                    "only attribute nodes are allowed",
                ));
            }
            out.push(node);
        }
        Ok(out)
    }

    fn require(
        &self,
        ok: bool,
        code: ErrorCode,
        kind: UpdateKind,
        detail: &str,
    ) -> Result<(), Error> {
        if ok {
            Ok(())
        } else {
            Err(type_error(code, kind, detail))
        }
    }

    fn prepare(&mut self, update: &PendingUpdate<H::Node>) -> Result<Prepared<H::Node>, Error> {
        let kind = update.kind();
        if kind == UpdateKind::Put {
            return Err(Error::not_implemented("put"));
        }
        let target = self.target(kind, update.target())?;
        let target_kind = self.host.kind(&target);
        let has_parent = self.host.parent(&target, None).is_some();
        Ok(match update {
            PendingUpdate::InsertInto { content, .. }
            | PendingUpdate::InsertIntoAsFirst { content, .. }
            | PendingUpdate::InsertIntoAsLast { content, .. } => {
                self.require(
                    target_kind.is_parent(),
                    ErrorCode::XUTY0005,
                    kind,
                    "target must be an element or document node",
                )?;
                let nodes = self.child_content(kind, content)?;
                match kind {
                    UpdateKind::InsertInto => Prepared::InsertInto(target, nodes),
                    UpdateKind::InsertIntoAsFirst => Prepared::InsertIntoAsFirst(target, nodes),
                    _ => Prepared::InsertIntoAsLast(target, nodes),
                }
            }
            PendingUpdate::InsertBefore { content, .. }
            | PendingUpdate::InsertAfter { content, .. } => {
                self.require(
                    is_child_kind(target_kind),
                    ErrorCode::XUTY0006,
                    kind,
                    "target must be an element, text, comment or processing instruction",
                )?;
                self.require(has_parent, ErrorCode::XUDY0029, kind, "target has no parent")?;
                let nodes = self.child_content(kind, content)?;
                if kind == UpdateKind::InsertBefore {
                    Prepared::InsertBefore(target, nodes)
                } else {
                    Prepared::InsertAfter(target, nodes)
                }
            }
            PendingUpdate::InsertAttributes { content, .. } => {
                self.require(
                    target_kind == NodeKind::Element,
                    ErrorCode::XUTY0022,
                    kind,
                    "target must be an element",
                )?;
                Prepared::InsertAttributes(target, self.attribute_content(kind, content)?)
            }
            PendingUpdate::Rename { new_name, .. } => {
                self.require(
                    matches!(
                        target_kind,
                        NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction
                    ),
                    ErrorCode::XUTY0012,
                    kind,
                    "target must be an element, attribute or processing instruction",
                )?;
                Prepared::Rename(target, new_name.clone())
            }
            PendingUpdate::ReplaceNode { replacement, .. } => {
                self.require(
                    target_kind == NodeKind::Attribute || is_child_kind(target_kind),
                    ErrorCode::XUTY0008,
                    kind,
                    "target cannot be replaced",
                )?;
                self.require(has_parent, ErrorCode::XUDY0009, kind, "target has no parent")?;
                let nodes = if target_kind == NodeKind::Attribute {
                    self.attribute_content(kind, replacement).map_err(|e| {
                        if e.code_enum() == ErrorCode::XPTY0004 {
                            type_error(
                                ErrorCode::XUTY0011,
                                kind,
                                "an attribute can only be replaced by attributes",
                            )
                        } else {
                            e
                        }
                    })?
                } else {
                    self.child_content(kind, replacement).map_err(|e| {
                        if e.code_enum() == ErrorCode::XUTY0004 {
                            type_error(
                                ErrorCode::XUTY0010,
                                kind,
                                "a child node cannot be replaced by attributes",
                            )
                        } else {
                            e
                        }
                    })?
                };
                Prepared::ReplaceNode(target, nodes)
            }
            PendingUpdate::ReplaceValue { value, .. } => {
                self.require(
                    matches!(
                        target_kind,
                        NodeKind::Attribute
                            | NodeKind::Text
                            | NodeKind::Comment
                            | NodeKind::ProcessingInstruction
                    ),
                    ErrorCode::XUTY0008,
                    kind,
                    "target has no value to replace",
                )?;
                Prepared::ReplaceValue(target, value.clone())
            }
            PendingUpdate::ReplaceElementContent { text, .. } => {
                self.require(
                    target_kind == NodeKind::Element,
                    ErrorCode::XUTY0008,
                    kind,
                    "target must be an element",
                )?;
                Prepared::ReplaceElementContent(target, text.clone())
            }
            PendingUpdate::Delete { .. } => Prepared::Delete(target),
            PendingUpdate::Put { .. } => return Err(Error::not_implemented("put")),
        })
    }
}

fn first_visible_child<H: HostTree>(host: &H, parent: &H::Node) -> Option<H::Node> {
    host.children(parent, None)
        .into_iter()
        .find(|c| host.kind(c) != NodeKind::DocumentType)
}

fn parent_of<H: HostTree>(host: &H, node: &H::Node) -> Result<H::Node, Error> {
    host.parent(node, None)
        .ok_or_else(|| Error::internal("update target lost its parent during apply"))
}

fn apply_one<H: HostTree>(host: &mut H, op: &Prepared<H::Node>) -> Result<(), Error> {
    match op {
        Prepared::InsertInto(target, nodes) | Prepared::InsertIntoAsLast(target, nodes) => {
            for n in nodes {
                host.insert_before(target, n, None)?;
            }
        }
        Prepared::InsertIntoAsFirst(target, nodes) => {
            let reference = first_visible_child(host, target);
            for n in nodes {
                host.insert_before(target, n, reference.as_ref())?;
            }
        }
        Prepared::InsertBefore(target, nodes) => {
            let parent = parent_of(host, target)?;
            for n in nodes {
                host.insert_before(&parent, n, Some(target))?;
            }
        }
        Prepared::InsertAfter(target, nodes) => {
            let parent = parent_of(host, target)?;
            let reference = host.next_sibling(target, None);
            for n in nodes {
                host.insert_before(&parent, n, reference.as_ref())?;
            }
        }
        Prepared::InsertAttributes(target, nodes) => {
            for n in nodes {
                host.set_attribute(target, n)?;
            }
        }
        Prepared::Rename(target, name) => host.rename(target, name.clone())?,
        Prepared::ReplaceNode(target, nodes) => {
            let parent = parent_of(host, target)?;
            if host.kind(target) == NodeKind::Attribute {
                host.remove(target)?;
                for n in nodes {
                    host.set_attribute(&parent, n)?;
                }
            } else {
                for n in nodes {
                    host.insert_before(&parent, n, Some(target))?;
                }
                host.remove(target)?;
            }
        }
        Prepared::ReplaceValue(target, value) => host.set_value(target, value)?,
        Prepared::ReplaceElementContent(target, text) => {
            for child in host.children(target, None) {
                host.remove(&child)?;
            }
            if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                let node = host.create_text(text);
                host.insert_before(target, &node, None)?;
            }
        }
        Prepared::Delete(target) => host.remove(target)?,
    }
    Ok(())
}

/// Check, prepare and apply an update list.
///
/// Every recoverable error is raised before the first mutation of the host tree. A
/// failure while applying means an invariant was broken and is reported as internal.
pub fn apply_updates<H: HostTree>(
    pul: PendingUpdateList<H::Node>,
    host: &mut H,
    arena: &SilhouetteArena<H::Node>,
    materializer: &mut Materializer<H::Node>,
    options: &EvaluationOptions,
) -> Result<(), Error> {
    if pul.is_empty() {
        return Ok(());
    }
    compatibility_check(&pul, &NodeFacade::new(&*host, arena))?;

    let mut preparer = Preparer {
        host,
        arena,
        materializer,
        options,
        used: HashSet::new(),
    };
    let mut ops = Vec::with_capacity(pul.len());
    for update in pul.iter() {
        ops.push(preparer.prepare(update)?);
    }
    let host = preparer.host;
    ops.sort_by_key(Prepared::stage);
    tracing::debug!(primitives = ops.len(), "applying pending update list");

    for op in &ops {
        tracing::trace!(op = ?op, "apply primitive");
        apply_one(host, op).map_err(|e| {
            Error::internal(format!("pending update list failed midway: {}", e.message))
                .with_source(Some(Arc::new(e) as ErrorSource))
        })?;
    }
    Ok(())
}
