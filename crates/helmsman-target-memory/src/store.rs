use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use helmsman_core::{Condition, LiveResource, ResourceKey, now_utc};
use helmsman_target::{TargetError, TargetEvent, TargetEventKind, TargetStore};
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// In-memory target backend using a papaya lock-free HashMap.
///
/// Besides the `TargetStore` contract it exposes simulation hooks: flipping
/// the whole target unavailable, failing the next N calls, permanently
/// rejecting a key, mutating payloads as an external writer (drift) and
/// driving status conditions.
pub struct MemoryTarget {
    data: PapayaHashMap<ResourceKey, LiveResource>,
    rejected: PapayaHashMap<ResourceKey, String>,
    events: broadcast::Sender<TargetEvent>,
    unavailable: AtomicBool,
    fail_next: AtomicU32,
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTarget {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            data: PapayaHashMap::new(),
            rejected: PapayaHashMap::new(),
            events,
            unavailable: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
        }
    }

    fn check_available(&self) -> Result<(), TargetError> {
        loop {
            let remaining = self.fail_next.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .fail_next
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(TargetError::unavailable("injected transient failure"));
            }
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TargetError::unavailable("memory target marked unavailable"));
        }
        Ok(())
    }

    fn check_rejected(&self, key: &ResourceKey) -> Result<(), TargetError> {
        let guard = self.rejected.pin();
        if let Some(message) = guard.get(key) {
            return Err(TargetError::rejected(key.to_string(), message.clone()));
        }
        Ok(())
    }

    fn emit(&self, key: &ResourceKey, kind: TargetEventKind) {
        // No receivers is fine; events are an optimization.
        let _ = self.events.send(TargetEvent::new(key.clone(), kind));
    }

    fn upsert(
        &self,
        key: &ResourceKey,
        payload: &Value,
        owner: &str,
    ) -> (LiveResource, Option<TargetEventKind>) {
        let guard = self.data.pin();
        match guard.get(key) {
            Some(existing) => {
                if existing.payload == *payload {
                    // Idempotent re-apply: no generation bump, no event.
                    return (existing.clone(), None);
                }
                let mut updated = existing.clone();
                updated.payload = payload.clone();
                updated.generation += 1;
                updated.last_updated = now_utc();
                if updated.owned_by.is_none() {
                    updated.owned_by = Some(owner.to_string());
                }
                guard.insert(key.clone(), updated.clone());
                (updated, Some(TargetEventKind::Updated))
            }
            None => {
                let created = LiveResource::new(
                    key.clone(),
                    uuid::Uuid::new_v4().to_string(),
                    payload.clone(),
                )
                .with_owner(owner);
                guard.insert(key.clone(), created.clone());
                (created, Some(TargetEventKind::Created))
            }
        }
    }

    fn modify<F>(&self, key: &ResourceKey, f: F) -> bool
    where
        F: FnOnce(&mut LiveResource),
    {
        let guard = self.data.pin();
        match guard.get(key) {
            Some(existing) => {
                let mut resource = existing.clone();
                f(&mut resource);
                resource.last_updated = now_utc();
                guard.insert(key.clone(), resource);
                true
            }
            None => false,
        }
    }

    // ==================== Simulation hooks ====================

    /// While set, every call fails with `TargetError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails the next `n` calls with a transient error, then recovers.
    pub fn fail_next_ops(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Permanently rejects writes to `key` with the given message.
    pub fn reject_key(&self, key: &ResourceKey, message: impl Into<String>) {
        self.rejected.pin().insert(key.clone(), message.into());
    }

    /// Inserts a resource that the controller does not own (pre-existing /
    /// unmanaged).
    pub fn inject_unmanaged(&self, key: ResourceKey, payload: Value) {
        let resource = LiveResource::new(key.clone(), uuid::Uuid::new_v4().to_string(), payload);
        self.data.pin().insert(key.clone(), resource);
        self.emit(&key, TargetEventKind::Created);
    }

    /// Mutates a payload as an external writer would: the generation bumps
    /// and the change is observable as drift on the next cycle.
    pub fn mutate_payload(&self, key: &ResourceKey, payload: Value) -> bool {
        let changed = self.modify(key, |res| {
            res.payload = payload;
            res.generation += 1;
        });
        if changed {
            self.emit(key, TargetEventKind::Updated);
        }
        changed
    }

    /// Replaces a resource's status conditions.
    pub fn set_conditions(&self, key: &ResourceKey, conditions: Vec<Condition>) -> bool {
        let changed = self.modify(key, |res| res.conditions = conditions);
        if changed {
            self.emit(key, TargetEventKind::StatusChanged);
        }
        changed
    }

    /// Reports the resource ready and caught up with its latest write.
    pub fn mark_ready(&self, key: &ResourceKey) -> bool {
        let changed = self.modify(key, |res| {
            res.observed_generation = res.generation;
            res.conditions = vec![Condition::ready()];
        });
        if changed {
            self.emit(key, TargetEventKind::StatusChanged);
        }
        changed
    }

    /// Reports a failure condition on the resource.
    pub fn mark_failed(&self, key: &ResourceKey, message: impl Into<String>) -> bool {
        let changed = self.modify(key, |res| {
            res.conditions = vec![Condition::failed(message.into())];
        });
        if changed {
            self.emit(key, TargetEventKind::StatusChanged);
        }
        changed
    }

    /// Sets the manual pause override on the resource.
    pub fn set_paused(&self, key: &ResourceKey, paused: bool) -> bool {
        let changed = self.modify(key, |res| res.paused = paused);
        if changed {
            self.emit(key, TargetEventKind::StatusChanged);
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TargetStore for MemoryTarget {
    async fn get(&self, key: &ResourceKey) -> Result<Option<LiveResource>, TargetError> {
        self.check_available()?;
        Ok(self.data.pin().get(key).cloned())
    }

    async fn get_many(
        &self,
        keys: &[ResourceKey],
    ) -> Result<BTreeMap<ResourceKey, LiveResource>, TargetError> {
        self.check_available()?;
        let guard = self.data.pin();
        let mut map = BTreeMap::new();
        for key in keys {
            if let Some(resource) = guard.get(key) {
                map.insert(key.clone(), resource.clone());
            }
        }
        Ok(map)
    }

    async fn list_owned(
        &self,
        owner: &str,
    ) -> Result<BTreeMap<ResourceKey, LiveResource>, TargetError> {
        self.check_available()?;
        let guard = self.data.pin();
        Ok(guard
            .iter()
            .filter(|(_, res)| res.is_owned_by(owner))
            .map(|(key, res)| (key.clone(), res.clone()))
            .collect())
    }

    async fn create(
        &self,
        key: &ResourceKey,
        payload: &Value,
        owner: &str,
    ) -> Result<LiveResource, TargetError> {
        self.check_available()?;
        self.check_rejected(key)?;
        let (resource, kind) = self.upsert(key, payload, owner);
        if let Some(kind) = kind {
            self.emit(key, kind);
        }
        Ok(resource)
    }

    async fn update(
        &self,
        key: &ResourceKey,
        payload: &Value,
        owner: &str,
    ) -> Result<LiveResource, TargetError> {
        self.check_available()?;
        self.check_rejected(key)?;
        let (resource, kind) = self.upsert(key, payload, owner);
        if let Some(kind) = kind {
            self.emit(key, kind);
        }
        Ok(resource)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), TargetError> {
        self.check_available()?;
        let removed = self.data.pin().remove(key).is_some();
        if removed {
            self.emit(key, TargetEventKind::Deleted);
        }
        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<TargetEvent>> {
        Some(self.events.subscribe())
    }

    fn target_name(&self) -> &'static str {
        "memory"
    }
}
