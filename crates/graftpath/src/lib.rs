pub mod consts;
pub mod cursor;
pub mod evaluation;
pub mod facade;
pub mod materialize;
pub mod model;
pub mod order;
pub mod pointer;
pub mod runtime;
pub mod update;
pub mod xdm;

pub use cursor::{
    FnExpression, SequenceExpression, Step, UpdatingCursor, UpdatingExpression, UpdatingResult,
    VariableReference, VariableScope, drive,
};
pub use evaluation::Evaluation;
pub use facade::NodeFacade;
pub use materialize::Materializer;
pub use model::simple::{
    NodeId, SimpleDocument, attr, attr_ns, comment, doc, doctype, elem, elem_ns, pi, text,
};
pub use model::{Bucket, HostTree, NodeKind, QName};
pub use order::{TieBreakers, compare, compare_positions, sort_and_dedup};
pub use pointer::{GraftPoint, NodeRef, Offset, Pointer, Silhouette, SilhouetteArena, SilhouetteId};
pub use runtime::{Error, ErrorCode, ErrorSource, EvaluationOptions, EvaluationOptionsBuilder};
pub use update::{
    CopyBinding, PendingUpdate, PendingUpdateList, TransferableName, TransferableUpdate,
    TransformExpression, UpdateKind, apply_updates, compatibility_check, merge_updates,
};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};
