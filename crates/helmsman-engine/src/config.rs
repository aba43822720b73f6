use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the reconciliation engine.
///
/// Polling and backoff cadence are deployment-specific, so every interval
/// here is configuration with a documented default rather than hard-coded
/// behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Inter-cycle wait when the previous cycle was clean. Default 30s.
    pub poll_interval_secs: u64,
    /// How long a resource may stay Progressing without reporting ready
    /// before it is considered Degraded. Default 120s.
    pub readiness_deadline_secs: u64,
    /// First inter-cycle delay after a failed cycle; doubles per consecutive
    /// failure. Default 5s.
    pub backoff_base_secs: u64,
    /// Upper bound on the failure backoff. Default 300s.
    pub backoff_cap_secs: u64,
    /// Apply attempts per op for transient target errors. Default 3.
    pub apply_retry_limit: u32,
    /// First retry delay within one apply; doubles per attempt. Default 200ms.
    pub apply_retry_base_ms: u64,
    /// Size of the shared worker pool for non-dependent applies. Default 8.
    pub worker_pool_size: usize,
    /// Age after which a cached declared snapshot served during a source
    /// outage is reported stale. Default 300s.
    pub cache_stale_after_secs: u64,
    /// Whether owned live resources missing from the declared set are
    /// deleted. The per-resource ownership marker still gates every delete.
    /// Default true.
    pub prune: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            readiness_deadline_secs: 120,
            backoff_base_secs: 5,
            backoff_cap_secs: 300,
            apply_retry_limit: 3,
            apply_retry_base_ms: 200,
            worker_pool_size: 8,
            cache_stale_after_secs: 300,
            prune: true,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("controller.poll_interval_secs must be > 0".into());
        }
        if self.readiness_deadline_secs == 0 {
            return Err("controller.readiness_deadline_secs must be > 0".into());
        }
        if self.backoff_base_secs == 0 {
            return Err("controller.backoff_base_secs must be > 0".into());
        }
        if self.backoff_cap_secs < self.backoff_base_secs {
            return Err("controller.backoff_cap_secs must be >= backoff_base_secs".into());
        }
        if self.apply_retry_limit == 0 {
            return Err("controller.apply_retry_limit must be > 0".into());
        }
        if self.worker_pool_size == 0 {
            return Err("controller.worker_pool_size must be > 0".into());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn readiness_deadline(&self) -> Duration {
        Duration::from_secs(self.readiness_deadline_secs)
    }

    pub fn apply_retry_base(&self) -> Duration {
        Duration::from_millis(self.apply_retry_base_ms)
    }

    pub fn cache_stale_after(&self) -> Duration {
        Duration::from_secs(self.cache_stale_after_secs)
    }

    /// Inter-cycle delay after `consecutive_failures` failed cycles:
    /// exponential from the base, capped.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.poll_interval();
        }
        let exp = consecutive_failures.saturating_sub(1).min(16);
        let secs = self
            .backoff_base_secs
            .saturating_mul(1u64 << exp)
            .min(self.backoff_cap_secs);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let cfg = ControllerConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ControllerConfig {
            worker_pool_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_cap_below_base() {
        let cfg = ControllerConfig {
            backoff_base_secs: 60,
            backoff_cap_secs: 30,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.backoff_delay(0), Duration::from_secs(30));
        assert_eq!(cfg.backoff_delay(1), Duration::from_secs(5));
        assert_eq!(cfg.backoff_delay(2), Duration::from_secs(10));
        assert_eq!(cfg.backoff_delay(3), Duration::from_secs(20));
        assert_eq!(cfg.backoff_delay(10), Duration::from_secs(300));
    }

    #[test]
    fn test_toml_deserialization_uses_defaults() {
        let cfg: ControllerConfig =
            serde_json::from_str(r#"{"poll_interval_secs": 5}"#).unwrap();
        assert_eq!(cfg.poll_interval_secs, 5);
        assert_eq!(cfg.worker_pool_size, 8);
    }
}
