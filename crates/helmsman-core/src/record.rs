use crate::health::HealthStatus;
use crate::key::ResourceKey;
use crate::sync::{SyncOutcome, SyncResult};
use crate::time::now_utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Counts and messages summarizing one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub applied: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Human-readable messages for every non-applied op, naming the resource.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<String>,
}

impl SyncSummary {
    pub fn from_results(results: &[SyncResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match &result.outcome {
                SyncOutcome::Applied => summary.applied += 1,
                SyncOutcome::Failed { reason, .. } => {
                    summary.failed += 1;
                    summary
                        .messages
                        .push(format!("{} {}: {}", result.kind, result.key, reason));
                }
                SyncOutcome::Skipped { reason } => {
                    summary.skipped += 1;
                    summary
                        .messages
                        .push(format!("{} {} skipped: {}", result.kind, result.key, reason));
                }
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Per-application reconciliation state.
///
/// Owned and mutated exclusively by the application's own reconciliation
/// loop; external consumers only ever see snapshot copies. Created on first
/// reconciliation, updated at cycle boundaries, torn down when the
/// application is deregistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRecord {
    pub app: String,
    /// Revision currently being reconciled, when one has been fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Monotonically increasing reconciliation attempt counter.
    pub attempt: u64,
    pub health: HealthStatus,
    /// Per-resource health from the last evaluation, keyed by display key.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub resources: BTreeMap<String, HealthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<SyncSummary>,
    /// Descriptive message for structural failures (cycles, unreachable
    /// source/target). Cleared on a clean cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// True when the declared snapshot was served from a cache past its
    /// configured staleness age.
    #[serde(default)]
    pub source_stale: bool,
    #[serde(with = "time::serde::rfc3339::option", default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ReconciliationRecord {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            revision: None,
            attempt: 0,
            health: HealthStatus::Unknown,
            resources: BTreeMap::new(),
            last_sync: None,
            message: None,
            source_stale: false,
            last_synced_at: None,
            updated_at: now_utc(),
        }
    }

    pub fn record_resource_health(&mut self, key: &ResourceKey, health: HealthStatus) {
        self.resources.insert(key.to_string(), health);
    }

    pub fn touch(&mut self) {
        self.updated_at = now_utc();
    }
}
