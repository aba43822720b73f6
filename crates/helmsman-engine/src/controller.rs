//! Application registry and loop lifecycle management.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use helmsman_core::ReconciliationRecord;
use helmsman_source::{DeclaredSource, SnapshotCache};
use helmsman_target::DynTarget;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ControllerConfig;
use crate::error::{EngineError, Result};
use crate::executor::SyncExecutor;
use crate::reconciler::{LoopCommand, ReconcileLoop};

const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Everything needed to start reconciling one application.
pub struct AppRegistration {
    pub name: String,
    pub source: Arc<dyn DeclaredSource>,
    /// Pin the application to a specific revision; `None` follows the
    /// source's head.
    pub revision: Option<String>,
}

struct AppHandle {
    record: Arc<ArcSwap<ReconciliationRecord>>,
    commands: mpsc::Sender<LoopCommand>,
    cancel: CancellationToken,
}

/// Owns every application loop against one target system.
///
/// Each registered application gets its own spawned loop task, command
/// channel and cancellation token; loops share the target handle and the
/// bounded apply worker pool. Status reads are lock-free snapshot loads and
/// never touch a loop.
pub struct Controller {
    target: DynTarget,
    config: ControllerConfig,
    pool: Arc<Semaphore>,
    apps: DashMap<String, AppHandle>,
    shutdown: CancellationToken,
}

impl Controller {
    /// # Errors
    ///
    /// Returns `Configuration` when the config fails validation.
    pub fn new(target: DynTarget, config: ControllerConfig) -> Result<Self> {
        config.validate().map_err(EngineError::configuration)?;
        let pool = Arc::new(Semaphore::new(config.worker_pool_size));
        Ok(Self {
            target,
            config,
            pool,
            apps: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Registers an application and spawns its reconciliation loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` when an application with this name is
    /// already running.
    pub fn register(&self, registration: AppRegistration) -> Result<()> {
        let name = registration.name;
        match self.apps.entry(name.clone()) {
            Entry::Occupied(_) => Err(EngineError::AlreadyRegistered(name)),
            Entry::Vacant(slot) => {
                let record = Arc::new(ArcSwap::from_pointee(ReconciliationRecord::new(&name)));
                let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
                let cancel = self.shutdown.child_token();

                let cache =
                    SnapshotCache::new(registration.source, self.config.cache_stale_after());
                let executor =
                    SyncExecutor::from_config(self.target.clone(), self.pool.clone(), &self.config);
                let reconcile = ReconcileLoop::new(
                    name.clone(),
                    cache,
                    registration.revision,
                    self.target.clone(),
                    executor,
                    self.config.clone(),
                    record.clone(),
                    rx,
                    cancel.clone(),
                );
                tokio::spawn(reconcile.run());

                info!(app = %name, "Application registered");
                slot.insert(AppHandle {
                    record,
                    commands: tx,
                    cancel,
                });
                Ok(())
            }
        }
    }

    /// Stops an application's loop and forgets its record.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` for an unknown application.
    pub fn deregister(&self, name: &str) -> Result<()> {
        let (_, handle) = self
            .apps
            .remove(name)
            .ok_or_else(|| EngineError::NotRegistered(name.to_string()))?;
        handle.cancel.cancel();
        info!(app = %name, "Application deregistered");
        Ok(())
    }

    /// Triggers an immediate sync cycle, bypassing any failure backoff.
    pub async fn force_sync(&self, name: &str) -> Result<()> {
        self.send(name, LoopCommand::SyncNow).await
    }

    /// Suspends reconciliation for an application.
    pub async fn pause(&self, name: &str) -> Result<()> {
        self.send(name, LoopCommand::Pause).await
    }

    /// Resumes a paused application and syncs immediately.
    pub async fn resume(&self, name: &str) -> Result<()> {
        self.send(name, LoopCommand::Resume).await
    }

    /// Snapshot of one application's reconciliation record.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` for an unknown application.
    pub fn status(&self, name: &str) -> Result<ReconciliationRecord> {
        self.apps
            .get(name)
            .map(|handle| (**handle.record.load()).clone())
            .ok_or_else(|| EngineError::NotRegistered(name.to_string()))
    }

    /// Snapshots of every registered application, sorted by name.
    pub fn status_all(&self) -> Vec<ReconciliationRecord> {
        let mut records: Vec<ReconciliationRecord> = self
            .apps
            .iter()
            .map(|entry| (**entry.value().record.load()).clone())
            .collect();
        records.sort_by(|a, b| a.app.cmp(&b.app));
        records
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.apps.contains_key(name)
    }

    /// Cancels every loop. Used on process shutdown.
    pub fn shutdown(&self) {
        info!(apps = self.apps.len(), "Controller shutting down");
        self.shutdown.cancel();
        self.apps.clear();
    }

    async fn send(&self, name: &str, command: LoopCommand) -> Result<()> {
        // Clone the sender out so no map shard lock is held across the await.
        let sender = self
            .apps
            .get(name)
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| EngineError::NotRegistered(name.to_string()))?;
        sender
            .send(command)
            .await
            .map_err(|_| EngineError::NotRegistered(name.to_string()))
    }
}
