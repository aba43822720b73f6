use crate::change::ChangeKind;
use crate::key::ResourceKey;
use crate::time::now_utc;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Outcome of applying one change op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SyncOutcome {
    Applied,
    Failed { reason: String, permanent: bool },
    Skipped { reason: String },
}

impl SyncOutcome {
    pub fn failed(reason: impl Into<String>, permanent: bool) -> Self {
        Self::Failed {
            reason: reason.into(),
            permanent,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-op sync result: outcome, completion time and the live generation
/// observed after the apply when the target returned one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub key: ResourceKey,
    pub kind: ChangeKind,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<u64>,
}

impl SyncResult {
    pub fn new(key: ResourceKey, kind: ChangeKind, outcome: SyncOutcome) -> Self {
        Self {
            key,
            kind,
            outcome,
            finished_at: now_utc(),
            observed_generation: None,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.observed_generation = Some(generation);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResourceKey {
        ResourceKey::new("Service", "default", "redis")
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(SyncOutcome::Applied.is_applied());
        assert!(!SyncOutcome::Applied.is_failed());
        assert!(SyncOutcome::failed("boom", true).is_failed());
        assert!(!SyncOutcome::skipped("paused").is_failed());
    }

    #[test]
    fn test_result_carries_generation() {
        let result =
            SyncResult::new(key(), ChangeKind::Update, SyncOutcome::Applied).with_generation(4);
        assert_eq!(result.observed_generation, Some(4));
        assert!(result.outcome.is_applied());
    }

    #[test]
    fn test_failed_result_serialization_names_reason() {
        let result = SyncResult::new(
            key(),
            ChangeKind::Create,
            SyncOutcome::failed("malformed payload", true),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "malformed payload");
        assert_eq!(json["permanent"], true);
    }
}
