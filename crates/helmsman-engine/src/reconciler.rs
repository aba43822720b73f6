//! The per-application reconciliation loop.
//!
//! One loop task per registered application: fetch declared state (through
//! the staleness-tracking cache), observe live state, diff, order, apply,
//! evaluate health and publish a fresh [`ReconciliationRecord`]. The loop is
//! the record's single writer; everyone else reads `ArcSwap` snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use helmsman_core::{
    HealthStatus, LiveResource, ReconciliationRecord, ResourceKey, SyncSummary, now_utc,
};
use helmsman_source::{SnapshotCache, SourceError};
use helmsman_target::{DynTarget, TargetEvent};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::executor::SyncExecutor;
use crate::graph::DependencyGraph;
use crate::health::HealthEvaluator;
use crate::{EngineError, diff};

/// Control messages accepted by a running application loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Run a cycle immediately, resetting any failure backoff.
    SyncNow,
    /// Stop syncing and report Suspended until resumed.
    Pause,
    /// Leave the paused state and run a cycle immediately.
    Resume,
}

pub(crate) struct ReconcileLoop {
    app: String,
    source: SnapshotCache,
    revision: Option<String>,
    target: DynTarget,
    executor: SyncExecutor,
    evaluator: HealthEvaluator,
    config: ControllerConfig,
    record: Arc<ArcSwap<ReconciliationRecord>>,
    commands: mpsc::Receiver<LoopCommand>,
    cancel: CancellationToken,
    paused: bool,
    consecutive_failures: u32,
}

impl ReconcileLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        app: String,
        source: SnapshotCache,
        revision: Option<String>,
        target: DynTarget,
        executor: SyncExecutor,
        config: ControllerConfig,
        record: Arc<ArcSwap<ReconciliationRecord>>,
        commands: mpsc::Receiver<LoopCommand>,
        cancel: CancellationToken,
    ) -> Self {
        let evaluator = HealthEvaluator::new(config.readiness_deadline());
        Self {
            app,
            source,
            revision,
            target,
            executor,
            evaluator,
            config,
            record,
            commands,
            cancel,
            paused: false,
            consecutive_failures: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(app = %self.app, target = self.target.target_name(), "Reconciliation loop started");
        let mut watch = self.target.watch();
        self.cycle().await;

        loop {
            let delay = self.config.backoff_delay(self.consecutive_failures);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                _ = tokio::time::sleep(delay) => {
                    if !self.paused {
                        self.cycle().await;
                    }
                }
                event = next_event(&mut watch) => {
                    // A change notification only nudges the loop; the cycle
                    // itself stays purely poll-shaped so polling-only
                    // backends behave identically.
                    if let Some(event) = event {
                        debug!(app = %self.app, key = %event.key, "Target event nudge");
                        if !self.paused {
                            self.cycle().await;
                        }
                    }
                }
            }
        }
        info!(app = %self.app, "Reconciliation loop stopped");
    }

    async fn handle_command(&mut self, command: LoopCommand) {
        match command {
            LoopCommand::SyncNow => {
                self.consecutive_failures = 0;
                if !self.paused {
                    self.cycle().await;
                }
            }
            LoopCommand::Pause => {
                self.paused = true;
                info!(app = %self.app, "Application paused");
                self.publish_status(HealthStatus::Suspended, Some("application paused".into()));
            }
            LoopCommand::Resume => {
                if self.paused {
                    self.paused = false;
                    self.consecutive_failures = 0;
                    info!(app = %self.app, "Application resumed");
                    self.cycle().await;
                }
            }
        }
    }

    /// One full reconciliation cycle. Failures feed the backoff counter;
    /// every outcome, including structural errors, lands in the published
    /// record.
    async fn cycle(&mut self) {
        let fetched = match self.source.fetch(self.revision.as_deref()).await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.fail_cycle(source_failure_health(&err), err.to_string());
                return;
            }
        };
        let snapshot = fetched.snapshot;
        let declared_keys: Vec<ResourceKey> =
            snapshot.specs.iter().map(|s| s.key.clone()).collect();

        let live = match self.observe(&declared_keys).await {
            Ok(live) => live,
            Err(err) => {
                self.evaluator.reset();
                self.fail_cycle(HealthStatus::Unknown, err.to_string());
                return;
            }
        };

        let ops = diff(&self.app, &snapshot, &live, self.config.prune);
        let graph = DependencyGraph::from_snapshot(&snapshot);
        let levels = match graph.order_ops(ops) {
            Ok(levels) => levels,
            Err(err) => {
                // A cycle is structural: zero ops are applied and only a new
                // revision can clear it, so the loop keeps its normal cadence.
                warn!(app = %self.app, error = %err, "Change set rejected");
                self.fail_cycle(HealthStatus::Degraded, err.to_string());
                return;
            }
        };

        let results = self.executor.apply(&self.app, levels, &self.cancel).await;
        let summary = SyncSummary::from_results(&results);

        let live = match self.observe(&declared_keys).await {
            Ok(live) => live,
            Err(err) => {
                self.evaluator.reset();
                self.fail_cycle(HealthStatus::Unknown, err.to_string());
                return;
            }
        };
        let (mut health, resources) = self.evaluator.evaluate_app(&declared_keys, &live);
        if summary.has_failures() {
            health = health.worst(HealthStatus::Degraded);
        }

        let clean = !summary.has_failures();
        self.consecutive_failures = if clean {
            0
        } else {
            self.consecutive_failures.saturating_add(1)
        };

        debug!(
            app = %self.app,
            revision = %snapshot.revision,
            applied = summary.applied,
            failed = summary.failed,
            skipped = summary.skipped,
            health = %health,
            "Cycle complete"
        );

        let mut record = self.next_record();
        record.attempt += 1;
        record.revision = Some(snapshot.revision.clone());
        record.health = health;
        record.resources = resources;
        record.last_sync = Some(summary);
        record.message = None;
        record.source_stale = fetched.stale;
        record.last_synced_at = Some(now_utc());
        self.record.store(Arc::new(record));
    }

    /// Live state relevant to this application: every declared key plus every
    /// resource carrying this application's ownership marker (the prune
    /// candidates).
    async fn observe(
        &self,
        declared: &[ResourceKey],
    ) -> Result<BTreeMap<ResourceKey, LiveResource>, EngineError> {
        let mut live = self.target.get_many(declared).await?;
        live.extend(self.target.list_owned(&self.app).await?);
        Ok(live)
    }

    fn fail_cycle(&mut self, health: HealthStatus, message: String) {
        warn!(app = %self.app, health = %health, message = %message, "Cycle failed");
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let mut record = self.next_record();
        record.attempt += 1;
        record.health = health;
        record.message = Some(message);
        self.record.store(Arc::new(record));
    }

    fn publish_status(&self, health: HealthStatus, message: Option<String>) {
        let mut record = self.next_record();
        record.health = health;
        record.message = message;
        self.record.store(Arc::new(record));
    }

    /// Copy of the current record with the update timestamp refreshed. The
    /// attempt counter advances only on actual cycles.
    fn next_record(&self) -> ReconciliationRecord {
        let mut record = (**self.record.load()).clone();
        record.touch();
        record
    }
}

fn source_failure_health(err: &SourceError) -> HealthStatus {
    if err.is_transient() {
        // Unreachable source with nothing cached: convergence is unknowable.
        HealthStatus::Unknown
    } else {
        HealthStatus::Degraded
    }
}

async fn next_event(watch: &mut Option<broadcast::Receiver<TargetEvent>>) -> Option<TargetEvent> {
    let Some(receiver) = watch.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Watch stream lagged, continuing");
            }
            Err(broadcast::error::RecvError::Closed) => {
                *watch = None;
                return None;
            }
        }
    }
}
