pub mod change;
pub mod error;
pub mod health;
pub mod key;
pub mod live;
pub mod record;
pub mod spec;
pub mod sync;
pub mod time;

pub use change::{ChangeKind, ChangeOp};
pub use error::{CoreError, Result};
pub use health::HealthStatus;
pub use key::ResourceKey;
pub use live::{Condition, ConditionStatus, LiveResource, conditions};
pub use record::{ReconciliationRecord, SyncSummary};
pub use spec::{DeclaredSnapshot, ResourceSpec, SpecPayload};
pub use sync::{SyncOutcome, SyncResult};
pub use time::now_utc;
