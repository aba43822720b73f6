use crate::key::ResourceKey;
use crate::time::now_utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Well-known condition types reported by target systems.
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const FAILED: &str = "Failed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// One observed status condition on a live resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_transition: OffsetDateTime,
}

impl Condition {
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            message: None,
            last_transition: now_utc(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn ready() -> Self {
        Self::new(conditions::READY, ConditionStatus::True)
    }

    pub fn not_ready() -> Self {
        Self::new(conditions::READY, ConditionStatus::False)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(conditions::FAILED, ConditionStatus::True).with_message(message)
    }
}

/// A resource as observed in the target system.
///
/// The controller never assumes it is the sole writer of a live resource;
/// drift caused by other writers is expected and is what reconciliation
/// corrects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResource {
    pub key: ResourceKey,
    /// Unique identity assigned by the target system at creation.
    pub uid: String,
    /// Observed configuration document.
    pub payload: Value,
    /// Write counter maintained by the target system.
    pub generation: u64,
    /// Generation the resource's own workload last acted on, as reported
    /// through its status.
    pub observed_generation: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub conditions: Vec<Condition>,
    /// Name of the application that owns this resource, when it was created
    /// by the controller. Unmanaged resources have no owner and are never
    /// pruned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    /// Manual override: a paused resource reports Suspended health and is
    /// left alone by sync.
    #[serde(default)]
    pub paused: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl LiveResource {
    pub fn new(key: ResourceKey, uid: impl Into<String>, payload: Value) -> Self {
        Self {
            key,
            uid: uid.into(),
            payload,
            generation: 1,
            observed_generation: 0,
            conditions: Vec::new(),
            owned_by: None,
            paused: false,
            last_updated: now_utc(),
        }
    }

    pub fn with_owner(mut self, app: impl Into<String>) -> Self {
        self.owned_by = Some(app.into());
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Whether the given application owns this resource (prune gate).
    pub fn is_owned_by(&self, app: &str) -> bool {
        self.owned_by.as_deref() == Some(app)
    }

    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// True when the Ready condition is True and the status has caught up
    /// with the latest write.
    pub fn is_ready(&self) -> bool {
        self.observed_generation >= self.generation
            && self
                .condition(conditions::READY)
                .map(|c| c.status == ConditionStatus::True)
                .unwrap_or(false)
    }

    /// True when a Failed condition is reported.
    pub fn is_failed(&self) -> bool {
        self.condition(conditions::FAILED)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }
}
