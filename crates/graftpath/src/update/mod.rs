//! Deferred updates: primitives, pending update lists, their compatibility check and
//! atomic application, and the copy-modify-return expression.
mod apply;
mod primitive;
mod pul;
mod transform;

pub use apply::apply_updates;
pub use primitive::{PendingUpdate, TransferableName, TransferableUpdate, UpdateKind};
pub use pul::{PendingUpdateList, compatibility_check, merge_updates};
pub use transform::{CopyBinding, TransformExpression};
