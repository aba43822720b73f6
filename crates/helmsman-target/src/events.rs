//! Change-notification events emitted by target backends.

use helmsman_core::ResourceKey;
use serde::{Deserialize, Serialize};

/// What happened to a live resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetEventKind {
    Created,
    Updated,
    Deleted,
    StatusChanged,
}

/// One change notification.
///
/// Events are an optimization over polling: they only nudge a reconciliation
/// loop to run its next cycle early. Every cycle still fetches a full live
/// snapshot, so correctness never depends on event delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEvent {
    pub key: ResourceKey,
    pub kind: TargetEventKind,
}

impl TargetEvent {
    pub fn new(key: ResourceKey, kind: TargetEventKind) -> Self {
        Self { key, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_construction() {
        let event = TargetEvent::new(
            ResourceKey::new("Deployment", "default", "vote"),
            TargetEventKind::Updated,
        );
        assert_eq!(event.kind, TargetEventKind::Updated);
        assert_eq!(event.key.name, "vote");
    }
}
