//! Target system abstraction.
//!
//! The target is the live side of reconciliation: a CRUD-style store of
//! resources with a status read and an optional change-notification
//! subscription. The controller never assumes it is the target's only
//! writer.

pub mod error;
pub mod events;
pub mod traits;

pub use error::TargetError;
pub use events::{TargetEvent, TargetEventKind};
pub use traits::{DynTarget, TargetStore};
