//! Applies ordered change ops against the target system.
//!
//! Execution is best-effort: one failed op never aborts the rest of the
//! queue. Ops inside one dependency level have no edges between them and run
//! concurrently under a shared bounded worker pool; levels are serialized.
//! Transient target errors are retried per op with exponential backoff,
//! permanent rejections fail immediately.

use std::sync::Arc;
use std::time::Duration;

use helmsman_core::{ChangeOp, SpecPayload, SyncOutcome, SyncResult};
use helmsman_target::{DynTarget, TargetError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ControllerConfig;

#[derive(Clone)]
pub struct SyncExecutor {
    target: DynTarget,
    pool: Arc<Semaphore>,
    retry_limit: u32,
    retry_base: Duration,
}

impl SyncExecutor {
    pub fn new(
        target: DynTarget,
        pool: Arc<Semaphore>,
        retry_limit: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            target,
            pool,
            retry_limit,
            retry_base,
        }
    }

    pub fn from_config(target: DynTarget, pool: Arc<Semaphore>, config: &ControllerConfig) -> Self {
        Self::new(
            target,
            pool,
            config.apply_retry_limit,
            config.apply_retry_base(),
        )
    }

    /// Applies the sequenced levels strictly in order, ops within a level
    /// concurrently. Results come back sorted by key within each level so
    /// the overall result order is deterministic.
    pub async fn apply(
        &self,
        app: &str,
        levels: Vec<Vec<ChangeOp>>,
        cancel: &CancellationToken,
    ) -> Vec<SyncResult> {
        let mut results = Vec::new();
        let mut levels = levels.into_iter();

        for level in levels.by_ref() {
            if cancel.is_cancelled() {
                results.extend(skip_all(level, "cycle cancelled"));
                break;
            }

            if level.len() == 1 {
                if let Some(op) = level.into_iter().next() {
                    results.push(self.apply_one(app, op, cancel).await);
                }
                continue;
            }

            let mut set = JoinSet::new();
            for op in level {
                let executor = self.clone();
                let app = app.to_string();
                let cancel = cancel.clone();
                set.spawn(async move {
                    let _permit = executor.pool.clone().acquire_owned().await;
                    executor.apply_one(&app, op, &cancel).await
                });
            }
            let mut level_results = Vec::with_capacity(set.len());
            while let Some(joined) = set.join_next().await {
                if let Ok(result) = joined {
                    level_results.push(result);
                }
            }
            level_results.sort_by(|a, b| a.key.cmp(&b.key));
            results.extend(level_results);
        }

        // Levels never started after a cancellation are surfaced as skipped.
        for level in levels {
            results.extend(skip_all(level, "cycle cancelled"));
        }
        results
    }

    async fn apply_one(&self, app: &str, op: ChangeOp, cancel: &CancellationToken) -> SyncResult {
        let key = op.key().clone();
        let kind = op.kind();

        // Synthetic op for an unparsable spec: fail without touching the
        // target so the problem stays visible in the results.
        if let ChangeOp::Invalid { reason, .. } = &op {
            return SyncResult::new(key, kind, SyncOutcome::failed(reason.clone(), true));
        }

        // The manual pause override pre-empts writes.
        let prior_paused = match &op {
            ChangeOp::Update { prior, .. } | ChangeOp::Delete { prior, .. } => prior.paused,
            _ => false,
        };
        if prior_paused {
            return SyncResult::new(key, kind, SyncOutcome::skipped("resource paused"));
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let call = self.dispatch(app, &op);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    return SyncResult::new(key, kind, SyncOutcome::skipped("cycle cancelled"));
                }
                outcome = call => outcome,
            };

            match outcome {
                Ok(generation) => {
                    debug!(app = %app, key = %key, op = %kind, attempt, "Change applied");
                    let mut result = SyncResult::new(key, kind, SyncOutcome::Applied);
                    result.observed_generation = generation;
                    return result;
                }
                Err(err) if err.is_transient() && attempt < self.retry_limit => {
                    let delay = self.retry_base * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        app = %app,
                        key = %key,
                        error = %err,
                        attempt,
                        "Transient apply failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return SyncResult::new(
                                key,
                                kind,
                                SyncOutcome::skipped("cycle cancelled"),
                            );
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    let permanent = !err.is_transient();
                    warn!(app = %app, key = %key, error = %err, permanent, "Apply failed");
                    return SyncResult::new(
                        key,
                        kind,
                        SyncOutcome::failed(err.to_string(), permanent),
                    );
                }
            }
        }
    }

    /// One target call for one op. Returns the post-apply generation when
    /// the target reports one.
    async fn dispatch(&self, app: &str, op: &ChangeOp) -> Result<Option<u64>, TargetError> {
        match op {
            ChangeOp::Create { spec } | ChangeOp::Update { spec, .. } => {
                let payload = match &spec.payload {
                    SpecPayload::Parsed(value) => value,
                    SpecPayload::Malformed(reason) => {
                        return Err(TargetError::rejected(spec.key.to_string(), reason.clone()));
                    }
                };
                let live = match op {
                    ChangeOp::Create { .. } => self.target.create(&spec.key, payload, app).await?,
                    _ => self.target.update(&spec.key, payload, app).await?,
                };
                Ok(Some(live.generation))
            }
            ChangeOp::Delete { key, .. } => {
                self.target.delete(key).await?;
                Ok(None)
            }
            ChangeOp::NoOp { .. } | ChangeOp::Invalid { .. } => Ok(None),
        }
    }
}

fn skip_all(level: Vec<ChangeOp>, reason: &str) -> Vec<SyncResult> {
    level
        .into_iter()
        .map(|op| {
            SyncResult::new(
                op.key().clone(),
                op.kind(),
                SyncOutcome::skipped(reason.to_string()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::{LiveResource, ResourceKey, ResourceSpec};
    use helmsman_target_memory::MemoryTarget;
    use serde_json::json;

    const APP: &str = "voting-app";

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("Deployment", "default", name)
    }

    fn create_op(name: &str) -> ChangeOp {
        ChangeOp::Create {
            spec: ResourceSpec::new(key(name), json!({"replicas": 1}), "r1"),
        }
    }

    fn executor(target: Arc<MemoryTarget>) -> SyncExecutor {
        SyncExecutor::new(
            target,
            Arc::new(Semaphore::new(4)),
            3,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_levels_apply_in_order() {
        let target = Arc::new(MemoryTarget::new());
        let exec = executor(target.clone());
        let cancel = CancellationToken::new();

        let results = exec
            .apply(
                APP,
                vec![vec![create_op("redis")], vec![create_op("vote")]],
                &cancel,
            )
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, key("redis"));
        assert_eq!(results[1].key, key("vote"));
        assert!(results.iter().all(|r| r.outcome.is_applied()));
        assert_eq!(target.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let target = Arc::new(MemoryTarget::new());
        target.fail_next_ops(2);
        let exec = executor(target.clone());

        let results = exec
            .apply(APP, vec![vec![create_op("vote")]], &CancellationToken::new())
            .await;
        assert!(results[0].outcome.is_applied());
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_transiently() {
        let target = Arc::new(MemoryTarget::new());
        target.fail_next_ops(10);
        let exec = executor(target.clone());

        let results = exec
            .apply(APP, vec![vec![create_op("vote")]], &CancellationToken::new())
            .await;
        match &results[0].outcome {
            SyncOutcome::Failed { permanent, .. } => assert!(!permanent),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_rejection_fails_without_retry() {
        let target = Arc::new(MemoryTarget::new());
        target.reject_key(&key("worker"), "malformed payload");
        let exec = executor(target.clone());

        let results = exec
            .apply(
                APP,
                vec![vec![create_op("worker")]],
                &CancellationToken::new(),
            )
            .await;
        match &results[0].outcome {
            SyncOutcome::Failed { reason, permanent } => {
                assert!(permanent);
                assert!(reason.contains("worker"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_remaining_ops() {
        let target = Arc::new(MemoryTarget::new());
        target.reject_key(&key("worker"), "malformed payload");
        let exec = executor(target.clone());

        let results = exec
            .apply(
                APP,
                vec![vec![create_op("vote")], vec![create_op("worker")]],
                &CancellationToken::new(),
            )
            .await;
        assert!(results[0].outcome.is_applied());
        assert!(results[1].outcome.is_failed());
    }

    #[tokio::test]
    async fn test_invalid_op_never_touches_target() {
        let target = Arc::new(MemoryTarget::new());
        let exec = executor(target.clone());

        let results = exec
            .apply(
                APP,
                vec![vec![ChangeOp::Invalid {
                    key: key("broken"),
                    reason: "bad json".to_string(),
                }]],
                &CancellationToken::new(),
            )
            .await;
        assert!(results[0].outcome.is_failed());
        assert!(target.is_empty());
    }

    #[tokio::test]
    async fn test_paused_resource_is_skipped() {
        let target = Arc::new(MemoryTarget::new());
        let exec = executor(target.clone());

        let mut prior = LiveResource::new(key("vote"), "uid", json!({"replicas": 1}));
        prior.paused = true;
        let op = ChangeOp::Update {
            spec: ResourceSpec::new(key("vote"), json!({"replicas": 2}), "r1"),
            prior: Box::new(prior),
        };

        let results = exec.apply(APP, vec![vec![op]], &CancellationToken::new()).await;
        match &results[0].outcome {
            SyncOutcome::Skipped { reason } => assert_eq!(reason, "resource paused"),
            other => panic!("expected Skipped, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_cycle_skips_everything() {
        let target = Arc::new(MemoryTarget::new());
        let exec = executor(target.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = exec
            .apply(
                APP,
                vec![vec![create_op("redis")], vec![create_op("vote")]],
                &cancel,
            )
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.outcome.is_applied()));
        assert!(target.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_level_applies_all_ops() {
        let target = Arc::new(MemoryTarget::new());
        let exec = executor(target.clone());

        let level: Vec<ChangeOp> = (0..8).map(|i| create_op(&format!("svc-{i}"))).collect();
        let results = exec
            .apply(APP, vec![level], &CancellationToken::new())
            .await;
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.outcome.is_applied()));
        // Deterministic order within the level
        let keys: Vec<String> = results.iter().map(|r| r.key.to_string()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
