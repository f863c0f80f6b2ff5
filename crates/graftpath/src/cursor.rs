//! Pull protocol for updating expressions.
//!
//! An expression is opened into a cursor; the driver polls the cursor until it reports
//! [`Step::Done`]. A cursor that waits on something outside the engine answers
//! [`Step::Pending`] and is simply polled again later.
use std::collections::HashMap;
use std::sync::Arc;

use crate::evaluation::Evaluation;
use crate::model::HostTree;
use crate::pointer::Pointer;
use crate::runtime::{Error, ErrorCode};
use crate::update::{PendingUpdateList, merge_updates};
use crate::xdm::{ExpandedName, XdmSequence};

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Ready(T),
    /// Not ready yet; poll again.
    Pending,
    Done,
}

/// Value of an updating expression together with the updates it requested.
#[derive(Debug, Clone)]
pub struct UpdatingResult<N> {
    pub value: XdmSequence<Pointer<N>>,
    pub pending_updates: PendingUpdateList<N>,
}

impl<N> Default for UpdatingResult<N> {
    fn default() -> Self {
        Self {
            value: Vec::new(),
            pending_updates: PendingUpdateList::new(),
        }
    }
}

impl<N> UpdatingResult<N> {
    pub fn new(value: XdmSequence<Pointer<N>>, pending_updates: PendingUpdateList<N>) -> Self {
        Self {
            value,
            pending_updates,
        }
    }

    /// A value without updates.
    pub fn value(value: XdmSequence<Pointer<N>>) -> Self {
        Self::new(value, PendingUpdateList::new())
    }

    /// Append another chunk: values concatenate, update lists merge in order.
    pub(crate) fn absorb(&mut self, other: UpdatingResult<N>) {
        self.value.extend(other.value);
        let mine = std::mem::take(&mut self.pending_updates);
        self.pending_updates = merge_updates(mine, [other.pending_updates]);
    }
}

pub trait UpdatingCursor<H: HostTree> {
    fn poll_next(
        &mut self,
        eval: &mut Evaluation<'_, H>,
    ) -> Result<Step<UpdatingResult<H::Node>>, Error>;
}

pub trait UpdatingExpression<H: HostTree> {
    fn open<'e>(&'e self, scope: &VariableScope<H::Node>) -> Box<dyn UpdatingCursor<H> + 'e>;
}

/// Immutable variable bindings; binding returns a new scope.
#[derive(Debug)]
pub struct VariableScope<N> {
    vars: Arc<HashMap<ExpandedName, XdmSequence<Pointer<N>>>>,
}

impl<N> Clone for VariableScope<N> {
    fn clone(&self) -> Self {
        Self {
            vars: Arc::clone(&self.vars),
        }
    }
}

impl<N> Default for VariableScope<N> {
    fn default() -> Self {
        Self {
            vars: Arc::new(HashMap::new()),
        }
    }
}

impl<N: Clone> VariableScope<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: ExpandedName, value: XdmSequence<Pointer<N>>) -> Self {
        let mut vars = (*self.vars).clone();
        vars.insert(name, value);
        Self {
            vars: Arc::new(vars),
        }
    }

    pub fn get(&self, name: &ExpandedName) -> Option<&XdmSequence<Pointer<N>>> {
        self.vars.get(name)
    }
}

type EvalFn<H> = dyn Fn(
    &mut Evaluation<'_, H>,
    &VariableScope<<H as HostTree>::Node>,
) -> Result<UpdatingResult<<H as HostTree>::Node>, Error>;

/// Expression backed by a closure, evaluated once per opened cursor.
pub struct FnExpression<H: HostTree> {
    func: Box<EvalFn<H>>,
    pending_polls: usize,
}

impl<H: HostTree> FnExpression<H> {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(
                &mut Evaluation<'_, H>,
                &VariableScope<H::Node>,
            ) -> Result<UpdatingResult<H::Node>, Error>
            + 'static,
    {
        Self {
            func: Box::new(func),
            pending_polls: 0,
        }
    }

    /// Report `Pending` this many times before producing the value.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }
}

struct FnCursor<'e, H: HostTree> {
    expr: &'e FnExpression<H>,
    scope: VariableScope<H::Node>,
    pending_left: usize,
    done: bool,
}

impl<H: HostTree> UpdatingCursor<H> for FnCursor<'_, H> {
    fn poll_next(
        &mut self,
        eval: &mut Evaluation<'_, H>,
    ) -> Result<Step<UpdatingResult<H::Node>>, Error> {
        if self.done {
            return Ok(Step::Done);
        }
        if self.pending_left > 0 {
            self.pending_left -= 1;
            return Ok(Step::Pending);
        }
        self.done = true;
        (self.expr.func)(eval, &self.scope).map(Step::Ready)
    }
}

impl<H: HostTree> UpdatingExpression<H> for FnExpression<H> {
    fn open<'e>(&'e self, scope: &VariableScope<H::Node>) -> Box<dyn UpdatingCursor<H> + 'e> {
        Box::new(FnCursor {
            expr: self,
            scope: scope.clone(),
            pending_left: self.pending_polls,
            done: false,
        })
    }
}

/// `$name`
#[derive(Debug, Clone)]
pub struct VariableReference {
    pub name: ExpandedName,
}

impl VariableReference {
    pub fn new(name: ExpandedName) -> Self {
        Self { name }
    }
}

struct VariableCursor<H: HostTree> {
    value: Option<Result<XdmSequence<Pointer<H::Node>>, Error>>,
}

impl<H: HostTree> UpdatingCursor<H> for VariableCursor<H> {
    fn poll_next(
        &mut self,
        _eval: &mut Evaluation<'_, H>,
    ) -> Result<Step<UpdatingResult<H::Node>>, Error> {
        match self.value.take() {
            Some(value) => value.map(|v| Step::Ready(UpdatingResult::value(v))),
            None => Ok(Step::Done),
        }
    }
}

impl<H: HostTree> UpdatingExpression<H> for VariableReference {
    fn open<'e>(&'e self, scope: &VariableScope<H::Node>) -> Box<dyn UpdatingCursor<H> + 'e> {
        let value = scope.get(&self.name).cloned().ok_or_else(|| {
            Error::from_code(
                ErrorCode::XPST0008,
                format!("variable ${} is not bound", self.name),
            )
        });
        Box::new(VariableCursor::<H> { value: Some(value) })
    }
}

/// Comma operator: operands evaluated in order, values concatenated, update lists merged.
pub struct SequenceExpression<H: HostTree> {
    operands: Vec<Box<dyn UpdatingExpression<H>>>,
}

impl<H: HostTree> SequenceExpression<H> {
    pub fn new(operands: Vec<Box<dyn UpdatingExpression<H>>>) -> Self {
        Self { operands }
    }
}

struct SequenceCursor<'e, H: HostTree> {
    operands: &'e [Box<dyn UpdatingExpression<H>>],
    scope: VariableScope<H::Node>,
    index: usize,
    current: Option<Box<dyn UpdatingCursor<H> + 'e>>,
}

impl<H: HostTree> UpdatingCursor<H> for SequenceCursor<'_, H> {
    fn poll_next(
        &mut self,
        eval: &mut Evaluation<'_, H>,
    ) -> Result<Step<UpdatingResult<H::Node>>, Error> {
        loop {
            if self.current.is_none() {
                let Some(operand) = self.operands.get(self.index) else {
                    return Ok(Step::Done);
                };
                self.current = Some(operand.open(&self.scope));
                self.index += 1;
            }
            let Some(cursor) = self.current.as_mut() else {
                continue;
            };
            match cursor.poll_next(eval)? {
                Step::Done => self.current = None,
                other => return Ok(other),
            }
        }
    }
}

impl<H: HostTree> UpdatingExpression<H> for SequenceExpression<H> {
    fn open<'e>(&'e self, scope: &VariableScope<H::Node>) -> Box<dyn UpdatingCursor<H> + 'e> {
        Box::new(SequenceCursor {
            operands: &self.operands,
            scope: scope.clone(),
            index: 0,
            current: None,
        })
    }
}

/// Pull `cursor` to completion, re-polling `Pending` up to the configured budget.
pub fn drive<H: HostTree>(
    cursor: &mut dyn UpdatingCursor<H>,
    eval: &mut Evaluation<'_, H>,
) -> Result<UpdatingResult<H::Node>, Error> {
    let mut result = UpdatingResult::default();
    let mut pending = 0usize;
    loop {
        match cursor.poll_next(eval)? {
            Step::Ready(chunk) => {
                pending = 0;
                result.absorb(chunk);
            }
            Step::Pending => {
                pending += 1;
                if let Some(max) = eval.options().max_pending_polls
                    && pending > max
                {
                    return Err(Error::from_code(
                        ErrorCode::EVAL0001,
                        format!("cursor still pending after {} polls", max),
                    ));
                }
            }
            Step::Done => return Ok(result),
        }
    }
}
