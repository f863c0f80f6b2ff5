use core::cmp::Ordering;

use crate::cursor::{UpdatingExpression, UpdatingResult, VariableScope, drive};
use crate::facade::NodeFacade;
use crate::materialize::{Materializer, deep_copy};
use crate::model::HostTree;
use crate::order::{self, TieBreakers};
use crate::pointer::{Pointer, SilhouetteArena};
use crate::runtime::{Error, EvaluationOptions};
use crate::update::{self, PendingUpdateList};
use crate::xdm::{XdmItem, XdmSequence};

type Ptr<H> = Pointer<<H as HostTree>::Node>;

/// State of one evaluation: exclusive access to the host tree plus every table whose
/// lifetime is bounded by the evaluation (silhouettes, tie-breakers, materialized roots).
pub struct Evaluation<'h, H: HostTree> {
    host: &'h mut H,
    arena: SilhouetteArena<H::Node>,
    tie_breakers: TieBreakers<H::Node>,
    materializer: Materializer<H::Node>,
    options: EvaluationOptions,
}

impl<'h, H: HostTree> Evaluation<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self::with_options(host, EvaluationOptions::default())
    }

    pub fn with_options(host: &'h mut H, options: EvaluationOptions) -> Self {
        Self {
            host,
            arena: SilhouetteArena::new(),
            tie_breakers: TieBreakers::new(),
            materializer: Materializer::new(),
            options,
        }
    }

    pub fn host(&self) -> &H {
        &*self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut *self.host
    }

    pub fn arena(&self) -> &SilhouetteArena<H::Node> {
        &self.arena
    }

    /// Silhouettes are added here by node constructors.
    pub fn arena_mut(&mut self) -> &mut SilhouetteArena<H::Node> {
        &mut self.arena
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    pub fn tie_breakers(&self) -> &TieBreakers<H::Node> {
        &self.tie_breakers
    }

    pub fn facade(&self) -> NodeFacade<'_, H> {
        NodeFacade::new(&*self.host, &self.arena)
    }

    pub fn compare(&mut self, a: &Ptr<H>, b: &Ptr<H>) -> Result<Ordering, Error> {
        let facade = NodeFacade::new(&*self.host, &self.arena);
        order::compare(&facade, &mut self.tie_breakers, a, b)
    }

    pub fn sort_and_dedup(&mut self, pointers: Vec<Ptr<H>>) -> Result<Vec<Ptr<H>>, Error> {
        let facade = NodeFacade::new(&*self.host, &self.arena);
        order::sort_and_dedup(&facade, &mut self.tie_breakers, pointers)
    }

    pub fn materialize(&mut self, ptr: &Ptr<H>) -> Result<H::Node, Error> {
        self.materializer.materialize(&mut *self.host, &self.arena, ptr)
    }

    /// Materialize every node of a result sequence; atomic values pass through.
    pub fn materialize_sequence(
        &mut self,
        seq: XdmSequence<Ptr<H>>,
    ) -> Result<XdmSequence<H::Node>, Error> {
        seq.into_iter()
            .map(|item| match item {
                XdmItem::Node(p) => self.materialize(&p).map(XdmItem::Node),
                XdmItem::Atomic(a) => Ok(XdmItem::Atomic(a)),
            })
            .collect()
    }

    /// Fresh, graft-free copy of the node `ptr` denotes, including its subtree.
    pub fn deep_copy(&mut self, ptr: &Ptr<H>) -> Result<H::Node, Error> {
        deep_copy(&mut *self.host, &self.arena, ptr)
    }

    pub fn apply_updates(&mut self, pul: PendingUpdateList<H::Node>) -> Result<(), Error> {
        update::apply_updates(
            pul,
            &mut *self.host,
            &self.arena,
            &mut self.materializer,
            &self.options,
        )
    }

    /// Evaluate an updating expression without applying its updates.
    pub fn evaluate_updating(
        &mut self,
        expr: &dyn UpdatingExpression<H>,
        scope: &VariableScope<H::Node>,
    ) -> Result<UpdatingResult<H::Node>, Error> {
        let mut cursor = expr.open(scope);
        drive(cursor.as_mut(), self)
    }

    /// Evaluate, then apply the resulting update list. Returns the value.
    pub fn run_updating(
        &mut self,
        expr: &dyn UpdatingExpression<H>,
        scope: &VariableScope<H::Node>,
    ) -> Result<XdmSequence<Ptr<H>>, Error> {
        let UpdatingResult {
            value,
            pending_updates,
        } = self.evaluate_updating(expr, scope)?;
        self.apply_updates(pending_updates)?;
        Ok(value)
    }
}
