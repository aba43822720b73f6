//! The target system trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use helmsman_core::{LiveResource, ResourceKey};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::TargetError;
use crate::events::TargetEvent;

/// Shared handle to a target backend.
pub type DynTarget = Arc<dyn TargetStore>;

/// CRUD-style access to the live side of reconciliation.
///
/// All write operations are idempotent by construction: creating a key that
/// already exists degrades to an update, updating with a payload equal to the
/// live one is a no-op write, and deleting an absent key succeeds. This is
/// what makes at-least-once retry safe.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Reads a live resource, including its status conditions.
    ///
    /// Returns `Ok(None)` for a resource that does not exist: absence is a
    /// valid, expected live state, not an error.
    ///
    /// # Errors
    ///
    /// Returns `TargetError::Unavailable` on transport failure.
    async fn get(&self, key: &ResourceKey) -> Result<Option<LiveResource>, TargetError>;

    /// Reads the live resources for the given keys. Keys that do not exist
    /// are simply absent from the returned map.
    async fn get_many(
        &self,
        keys: &[ResourceKey],
    ) -> Result<BTreeMap<ResourceKey, LiveResource>, TargetError>;

    /// Lists every live resource owned by the given application.
    ///
    /// Used to find prune candidates: owned resources no longer declared.
    async fn list_owned(
        &self,
        owner: &str,
    ) -> Result<BTreeMap<ResourceKey, LiveResource>, TargetError>;

    /// Creates a resource with the given payload, marking it owned by `owner`.
    ///
    /// Creating an existing key degrades to an update of its payload.
    async fn create(
        &self,
        key: &ResourceKey,
        payload: &Value,
        owner: &str,
    ) -> Result<LiveResource, TargetError>;

    /// Updates a resource's payload.
    ///
    /// Updating an absent key degrades to a create. An update whose payload
    /// equals the live payload does not bump the generation.
    async fn update(
        &self,
        key: &ResourceKey,
        payload: &Value,
        owner: &str,
    ) -> Result<LiveResource, TargetError>;

    /// Deletes a resource. Deleting an absent key succeeds.
    async fn delete(&self, key: &ResourceKey) -> Result<(), TargetError>;

    /// Subscribes to change notifications, when the backend supports them.
    ///
    /// Returns `None` for polling-only backends; the reconciliation loop must
    /// function correctly either way.
    fn watch(&self) -> Option<broadcast::Receiver<TargetEvent>>;

    /// Name of this target backend for logging/debugging.
    fn target_name(&self) -> &'static str;
}
