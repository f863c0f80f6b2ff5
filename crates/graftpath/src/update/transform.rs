//! `copy $v := source modify expr return expr`
//!
//! Sources are copied into fresh, parentless host nodes before the modify clause runs,
//! so the modify updates can only ever touch those copies.
use std::collections::HashSet;

use crate::cursor::{Step, UpdatingCursor, UpdatingExpression, UpdatingResult, VariableScope};
use crate::evaluation::Evaluation;
use crate::model::HostTree;
use crate::pointer::Pointer;
use crate::runtime::{Error, ErrorCode};
use crate::xdm::{ExpandedName, XdmItem};

use super::primitive::PendingUpdate;
use super::pul::{PendingUpdateList, merge_updates};

/// `$name := source` in a copy clause.
pub struct CopyBinding<H: HostTree> {
    pub name: ExpandedName,
    pub source: Box<dyn UpdatingExpression<H>>,
}

impl<H: HostTree> CopyBinding<H> {
    pub fn new(name: ExpandedName, source: Box<dyn UpdatingExpression<H>>) -> Self {
        Self { name, source }
    }
}

pub struct TransformExpression<H: HostTree> {
    bindings: Vec<CopyBinding<H>>,
    modify: Box<dyn UpdatingExpression<H>>,
    return_expr: Box<dyn UpdatingExpression<H>>,
}

impl<H: HostTree> TransformExpression<H> {
    pub fn new(
        bindings: Vec<CopyBinding<H>>,
        modify: Box<dyn UpdatingExpression<H>>,
        return_expr: Box<dyn UpdatingExpression<H>>,
    ) -> Self {
        Self {
            bindings,
            modify,
            return_expr,
        }
    }

    /// Append one more copy binding. Its source sees every earlier binding.
    pub fn with_copy(
        mut self,
        name: ExpandedName,
        source: Box<dyn UpdatingExpression<H>>,
    ) -> Self {
        self.bindings.push(CopyBinding::new(name, source));
        self
    }
}

enum Phase<'e, H: HostTree> {
    Copy {
        index: usize,
        cursor: Option<Box<dyn UpdatingCursor<H> + 'e>>,
        acc: UpdatingResult<H::Node>,
    },
    Modify {
        cursor: Box<dyn UpdatingCursor<H> + 'e>,
        pul: PendingUpdateList<H::Node>,
    },
    Return {
        cursor: Box<dyn UpdatingCursor<H> + 'e>,
        acc: UpdatingResult<H::Node>,
    },
    Done,
}

struct TransformCursor<'e, H: HostTree> {
    expr: &'e TransformExpression<H>,
    scope: VariableScope<H::Node>,
    created: HashSet<H::Node>,
    source_puls: Vec<PendingUpdateList<H::Node>>,
    phase: Phase<'e, H>,
}

impl<H: HostTree> TransformCursor<'_, H> {
    fn is_created(&self, host: &H, ptr: &Pointer<H::Node>) -> bool {
        let mut cur = ptr.real_node().cloned();
        while let Some(node) = cur {
            if self.created.contains(&node) {
                return true;
            }
            cur = host.parent(&node, None);
        }
        false
    }

    /// Copy the single node a source produced and bind it.
    fn bind_copy(
        &mut self,
        eval: &mut Evaluation<'_, H>,
        index: usize,
        source: UpdatingResult<H::Node>,
    ) -> Result<(), Error> {
        let expr = self.expr;
        let binding = &expr.bindings[index];
        let mut items = source.value.into_iter();
        let node = match (items.next(), items.next()) {
            (Some(XdmItem::Node(node)), None) => node,
            _ => {
                return Err(Error::from_code(
                    ErrorCode::XUTY0013,
                    format!("source of ${} must be exactly one node", binding.name),
                ));
            }
        };
        let copy = eval.deep_copy(&node)?;
        tracing::debug!(variable = %binding.name, copy = ?copy, "bound copy of transform source");
        self.created.insert(copy.clone());
        self.source_puls.push(source.pending_updates);
        self.scope = self
            .scope
            .bind(binding.name.clone(), vec![XdmItem::Node(Pointer::real(copy))]);
        Ok(())
    }

    fn check_modify_targets(
        &self,
        eval: &Evaluation<'_, H>,
        pul: &PendingUpdateList<H::Node>,
    ) -> Result<(), Error> {
        let facade = eval.facade();
        for update in pul {
            if let PendingUpdate::Put { uri, .. } = update {
                return Err(Error::from_code(
                    ErrorCode::XUDY0037,
                    format!("put to {} inside a modify clause", uri),
                ));
            }
            if !self.is_created(eval.host(), update.target()) {
                return Err(Error::from_code(
                    ErrorCode::XUDY0014,
                    format!(
                        "{} targets {} which was not created by the copy clause",
                        update.kind().as_str(),
                        facade
                            .node_name(update.target())
                            .unwrap_or_else(|| {
                                format!("{:?}", facade.node_kind(update.target()))
                            })
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl<'e, H: HostTree> UpdatingCursor<H> for TransformCursor<'e, H> {
    fn poll_next(
        &mut self,
        eval: &mut Evaluation<'_, H>,
    ) -> Result<Step<UpdatingResult<H::Node>>, Error> {
        let expr = self.expr;
        loop {
            match &mut self.phase {
                Phase::Copy { index, cursor, acc } => {
                    let i = *index;
                    let Some(binding) = expr.bindings.get(i) else {
                        tracing::debug!(copies = self.created.len(), "transform: modify");
                        self.phase = Phase::Modify {
                            cursor: expr.modify.open(&self.scope),
                            pul: PendingUpdateList::new(),
                        };
                        continue;
                    };
                    let source = cursor.get_or_insert_with(|| binding.source.open(&self.scope));
                    match source.poll_next(eval)? {
                        Step::Pending => return Ok(Step::Pending),
                        Step::Ready(chunk) => acc.absorb(chunk),
                        Step::Done => {
                            let produced = std::mem::take(acc);
                            // a failed binding ends the transform
                            self.phase = Phase::Done;
                            self.bind_copy(eval, i, produced)?;
                            self.phase = Phase::Copy {
                                index: i + 1,
                                cursor: None,
                                acc: UpdatingResult::default(),
                            };
                        }
                    }
                }
                Phase::Modify { cursor, pul } => match cursor.poll_next(eval)? {
                    Step::Pending => return Ok(Step::Pending),
                    // the value of the modify clause is discarded
                    Step::Ready(chunk) => {
                        let mine = std::mem::take(pul);
                        *pul = merge_updates(mine, [chunk.pending_updates]);
                    }
                    Step::Done => {
                        let pul = std::mem::take(pul);
                        // the modify list is applied at most once, even if apply fails
                        self.phase = Phase::Done;
                        self.check_modify_targets(eval, &pul)?;
                        tracing::debug!(primitives = pul.len(), "transform: applying modify");
                        eval.apply_updates(pul)?;
                        self.phase = Phase::Return {
                            cursor: expr.return_expr.open(&self.scope),
                            acc: UpdatingResult::default(),
                        };
                    }
                },
                Phase::Return { cursor, acc } => match cursor.poll_next(eval)? {
                    Step::Pending => return Ok(Step::Pending),
                    Step::Ready(chunk) => acc.absorb(chunk),
                    Step::Done => {
                        let UpdatingResult {
                            value,
                            pending_updates,
                        } = std::mem::take(acc);
                        let puls = std::mem::take(&mut self.source_puls);
                        self.phase = Phase::Done;
                        tracing::debug!("transform: done");
                        return Ok(Step::Ready(UpdatingResult::new(
                            value,
                            merge_updates(pending_updates, puls),
                        )));
                    }
                },
                Phase::Done => return Ok(Step::Done),
            }
        }
    }
}

impl<H: HostTree> UpdatingExpression<H> for TransformExpression<H> {
    fn open<'e>(&'e self, scope: &VariableScope<H::Node>) -> Box<dyn UpdatingCursor<H> + 'e> {
        Box::new(TransformCursor {
            expr: self,
            scope: scope.clone(),
            created: HashSet::new(),
            source_puls: Vec::new(),
            phase: Phase::Copy {
                index: 0,
                cursor: None,
                acc: UpdatingResult::default(),
            },
        })
    }
}
