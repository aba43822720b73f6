//! Per-resource health state machine and application-level aggregation.
//!
//! The evaluator is owned by one application's loop and mutated only there,
//! so the progressing timers need no synchronization.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use helmsman_core::{now_utc, HealthStatus, LiveResource, ResourceKey};
use time::OffsetDateTime;
use tracing::debug;

/// Evaluates resource health from live observations.
///
/// Transitions:
/// - paused marker set: Suspended, pre-empting everything else
/// - failure condition reported: Degraded
/// - ready and generation caught up: Healthy
/// - otherwise Progressing, until the readiness deadline elapses without a
///   ready report, at which point the timeout itself degrades the resource
/// - a resource with no live observation yet is Progressing (mid-create)
#[derive(Debug)]
pub struct HealthEvaluator {
    readiness_deadline: time::Duration,
    progressing_since: HashMap<ResourceKey, OffsetDateTime>,
}

impl HealthEvaluator {
    pub fn new(readiness_deadline: Duration) -> Self {
        Self {
            readiness_deadline: time::Duration::new(
                readiness_deadline.as_secs() as i64,
                readiness_deadline.subsec_nanos() as i32,
            ),
            progressing_since: HashMap::new(),
        }
    }

    /// Health of one resource. `live` is `None` when the target has no
    /// observation for a declared key yet.
    pub fn evaluate(&mut self, key: &ResourceKey, live: Option<&LiveResource>) -> HealthStatus {
        let Some(resource) = live else {
            return self.progressing(key);
        };

        if resource.paused {
            self.progressing_since.remove(key);
            return HealthStatus::Suspended;
        }
        if resource.is_failed() {
            self.progressing_since.remove(key);
            return HealthStatus::Degraded;
        }
        if resource.is_ready() {
            self.progressing_since.remove(key);
            return HealthStatus::Healthy;
        }
        self.progressing(key)
    }

    /// Health of every declared resource plus the aggregate. Timers for keys
    /// that left the declared set are dropped.
    pub fn evaluate_app(
        &mut self,
        declared: &[ResourceKey],
        live: &BTreeMap<ResourceKey, LiveResource>,
    ) -> (HealthStatus, BTreeMap<String, HealthStatus>) {
        let mut statuses = BTreeMap::new();
        for key in declared {
            let status = self.evaluate(key, live.get(key));
            statuses.insert(key.to_string(), status);
        }
        self.progressing_since
            .retain(|key, _| declared.contains(key));
        let aggregate = HealthStatus::aggregate(statuses.values().copied());
        (aggregate, statuses)
    }

    /// Drops all timers, for when the target became unreachable and every
    /// observation is void.
    pub fn reset(&mut self) {
        self.progressing_since.clear();
    }

    fn progressing(&mut self, key: &ResourceKey) -> HealthStatus {
        let since = *self
            .progressing_since
            .entry(key.clone())
            .or_insert_with(now_utc);
        if now_utc() - since >= self.readiness_deadline {
            debug!(key = %key, "Readiness deadline elapsed without ready report");
            return HealthStatus::Degraded;
        }
        HealthStatus::Progressing
    }

    /// Test hook: rewinds a progressing timer so deadline expiry can be
    /// exercised without waiting.
    #[doc(hidden)]
    pub fn backdate_progressing(&mut self, key: &ResourceKey, by: Duration) {
        if let Some(since) = self.progressing_since.get_mut(key) {
            *since -= time::Duration::new(by.as_secs() as i64, by.subsec_nanos() as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::Condition;
    use serde_json::json;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("Deployment", "default", name)
    }

    fn live(name: &str) -> LiveResource {
        LiveResource::new(key(name), "uid", json!({"replicas": 1}))
    }

    fn evaluator() -> HealthEvaluator {
        HealthEvaluator::new(Duration::from_secs(120))
    }

    #[test]
    fn test_missing_observation_is_progressing() {
        let mut eval = evaluator();
        assert_eq!(
            eval.evaluate(&key("vote"), None),
            HealthStatus::Progressing
        );
    }

    #[test]
    fn test_ready_resource_is_healthy() {
        let mut eval = evaluator();
        let mut resource = live("vote");
        resource.observed_generation = resource.generation;
        resource.conditions.push(Condition::ready());
        assert_eq!(
            eval.evaluate(&key("vote"), Some(&resource)),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn test_generation_lag_keeps_progressing() {
        let mut eval = evaluator();
        let mut resource = live("vote");
        resource.generation = 3;
        resource.observed_generation = 2;
        resource.conditions.push(Condition::ready());
        assert_eq!(
            eval.evaluate(&key("vote"), Some(&resource)),
            HealthStatus::Progressing
        );
    }

    #[test]
    fn test_failure_condition_is_degraded() {
        let mut eval = evaluator();
        let mut resource = live("worker");
        resource.conditions.push(Condition::failed("crash loop"));
        assert_eq!(
            eval.evaluate(&key("worker"), Some(&resource)),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn test_paused_preempts_failure() {
        let mut eval = evaluator();
        let mut resource = live("worker");
        resource.conditions.push(Condition::failed("crash loop"));
        resource.paused = true;
        assert_eq!(
            eval.evaluate(&key("worker"), Some(&resource)),
            HealthStatus::Suspended
        );
    }

    #[test]
    fn test_readiness_deadline_degrades() {
        let mut eval = evaluator();
        let k = key("vote");
        assert_eq!(eval.evaluate(&k, Some(&live("vote"))), HealthStatus::Progressing);
        eval.backdate_progressing(&k, Duration::from_secs(121));
        assert_eq!(eval.evaluate(&k, Some(&live("vote"))), HealthStatus::Degraded);
    }

    #[test]
    fn test_recovery_after_degraded_timeout() {
        let mut eval = evaluator();
        let k = key("vote");
        eval.evaluate(&k, Some(&live("vote")));
        eval.backdate_progressing(&k, Duration::from_secs(121));
        assert_eq!(eval.evaluate(&k, Some(&live("vote"))), HealthStatus::Degraded);

        let mut ready = live("vote");
        ready.observed_generation = ready.generation;
        ready.conditions.push(Condition::ready());
        assert_eq!(eval.evaluate(&k, Some(&ready)), HealthStatus::Healthy);
    }

    #[test]
    fn test_evaluate_app_aggregates_worst() {
        let mut eval = evaluator();
        let mut live_map = BTreeMap::new();

        let mut healthy = live("vote");
        healthy.observed_generation = healthy.generation;
        healthy.conditions.push(Condition::ready());
        live_map.insert(key("vote"), healthy);

        let mut failed = live("worker");
        failed.conditions.push(Condition::failed("oom"));
        live_map.insert(key("worker"), failed);

        let declared = vec![key("vote"), key("worker")];
        let (aggregate, statuses) = eval.evaluate_app(&declared, &live_map);
        assert_eq!(aggregate, HealthStatus::Degraded);
        assert_eq!(
            statuses.get("Deployment/default/vote"),
            Some(&HealthStatus::Healthy)
        );
        assert_eq!(
            statuses.get("Deployment/default/worker"),
            Some(&HealthStatus::Degraded)
        );
    }

    #[test]
    fn test_empty_app_is_healthy() {
        let mut eval = evaluator();
        let (aggregate, statuses) = eval.evaluate_app(&[], &BTreeMap::new());
        assert_eq!(aggregate, HealthStatus::Healthy);
        assert!(statuses.is_empty());
    }
}
