//! Structural diff between declared and live state.
//!
//! The diff is deterministic: specs are visited in declared source-path
//! order and prune candidates in sorted key order, so identical inputs
//! always yield an identical op sequence before topological sorting.

use std::collections::BTreeMap;

use helmsman_core::{ChangeOp, DeclaredSnapshot, LiveResource, ResourceKey, SpecPayload};
use serde_json::Value;
use tracing::debug;

/// Computes the change set for one application.
///
/// - declared key absent from live: Create
/// - declared key present: Update when a managed field differs, else NoOp
/// - live key absent from declared: Delete, but only when the resource is
///   owned by `app` (the prune safety gate) and pruning is enabled
/// - unparsable declared payload: a synthetic Invalid op, so the problem is
///   visible in the sync results instead of silently dropped
pub fn diff(
    app: &str,
    declared: &DeclaredSnapshot,
    live: &BTreeMap<ResourceKey, LiveResource>,
    prune: bool,
) -> Vec<ChangeOp> {
    let mut ops = Vec::with_capacity(declared.specs.len());

    for spec in &declared.specs {
        let payload = match &spec.payload {
            SpecPayload::Parsed(value) => value,
            SpecPayload::Malformed(reason) => {
                ops.push(ChangeOp::Invalid {
                    key: spec.key.clone(),
                    reason: reason.clone(),
                });
                continue;
            }
        };

        match live.get(&spec.key) {
            None => ops.push(ChangeOp::Create { spec: spec.clone() }),
            Some(prior) => {
                if managed_fields_equal(payload, &prior.payload) {
                    ops.push(ChangeOp::NoOp {
                        key: spec.key.clone(),
                    });
                } else {
                    ops.push(ChangeOp::Update {
                        spec: spec.clone(),
                        prior: Box::new(prior.clone()),
                    });
                }
            }
        }
    }

    if prune {
        // BTreeMap iteration keeps prune candidates in sorted key order.
        for (key, prior) in live {
            if declared.get(key).is_some() {
                continue;
            }
            if !prior.is_owned_by(app) {
                debug!(key = %key, "Skipping unmanaged live resource");
                continue;
            }
            ops.push(ChangeOp::Delete {
                key: key.clone(),
                prior: Box::new(prior.clone()),
            });
        }
    }

    ops
}

/// Field-level comparison restricted to the fields the controller manages:
/// every field present in the declared payload must match the live value,
/// while live fields outside the declared schema (server-injected status,
/// defaulted fields) are ignored to avoid perpetual false drift. Object key
/// ordering is irrelevant; array order is significant.
pub fn managed_fields_equal(declared: &Value, live: &Value) -> bool {
    match (declared, live) {
        (Value::Object(decl), Value::Object(observed)) => decl.iter().all(|(field, dv)| {
            observed
                .get(field)
                .map(|lv| managed_fields_equal(dv, lv))
                .unwrap_or(false)
        }),
        (Value::Array(decl), Value::Array(observed)) => {
            decl.len() == observed.len()
                && decl
                    .iter()
                    .zip(observed.iter())
                    .all(|(dv, lv)| managed_fields_equal(dv, lv))
        }
        (decl, observed) => decl == observed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::{ChangeKind, ResourceSpec};
    use serde_json::json;

    const APP: &str = "voting-app";

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new("Deployment", "default", name)
    }

    fn spec(name: &str, payload: Value) -> ResourceSpec {
        ResourceSpec::new(key(name), payload, "r1")
    }

    fn owned(name: &str, payload: Value) -> LiveResource {
        LiveResource::new(key(name), "uid", payload).with_owner(APP)
    }

    #[test]
    fn test_absent_live_yields_create() {
        let declared = DeclaredSnapshot::new("r1", vec![spec("vote", json!({"replicas": 2}))]);
        let ops = diff(APP, &declared, &BTreeMap::new(), true);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind(), ChangeKind::Create);
    }

    #[test]
    fn test_equal_managed_fields_yield_noop() {
        let declared = DeclaredSnapshot::new("r1", vec![spec("vote", json!({"replicas": 2}))]);
        let mut live = BTreeMap::new();
        live.insert(
            key("vote"),
            owned("vote", json!({"replicas": 2, "injectedDefault": true})),
        );
        let ops = diff(APP, &declared, &live, true);
        assert_eq!(ops[0].kind(), ChangeKind::NoOp);
    }

    #[test]
    fn test_managed_drift_yields_update() {
        let declared = DeclaredSnapshot::new("r1", vec![spec("vote", json!({"replicas": 3}))]);
        let mut live = BTreeMap::new();
        live.insert(key("vote"), owned("vote", json!({"replicas": 1})));
        let ops = diff(APP, &declared, &live, true);
        assert_eq!(ops[0].kind(), ChangeKind::Update);
    }

    #[test]
    fn test_unowned_live_resource_is_never_deleted() {
        let declared = DeclaredSnapshot::new("r1", vec![]);
        let mut live = BTreeMap::new();
        live.insert(
            key("service-c"),
            LiveResource::new(key("service-c"), "uid", json!({})),
        );
        let ops = diff(APP, &declared, &live, true);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_owned_undeclared_resource_is_pruned() {
        let declared = DeclaredSnapshot::new("r1", vec![]);
        let mut live = BTreeMap::new();
        live.insert(key("stale"), owned("stale", json!({})));
        let ops = diff(APP, &declared, &live, true);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind(), ChangeKind::Delete);
    }

    #[test]
    fn test_prune_disabled_emits_no_deletes() {
        let declared = DeclaredSnapshot::new("r1", vec![]);
        let mut live = BTreeMap::new();
        live.insert(key("stale"), owned("stale", json!({})));
        let ops = diff(APP, &declared, &live, false);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_resource_owned_by_other_app_is_not_pruned() {
        let declared = DeclaredSnapshot::new("r1", vec![]);
        let mut live = BTreeMap::new();
        live.insert(
            key("other"),
            LiveResource::new(key("other"), "uid", json!({})).with_owner("another-app"),
        );
        let ops = diff(APP, &declared, &live, true);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_malformed_spec_yields_invalid_op() {
        let declared = DeclaredSnapshot::new(
            "r1",
            vec![ResourceSpec::malformed(key("broken"), "trailing comma", "r1")],
        );
        let ops = diff(APP, &declared, &BTreeMap::new(), true);
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            ChangeOp::Invalid { reason, .. } => assert_eq!(reason, "trailing comma"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_diff_is_deterministic() {
        let declared = DeclaredSnapshot::new(
            "r1",
            vec![
                spec("vote", json!({"replicas": 2})),
                spec("result", json!({"replicas": 1})),
                spec("worker", json!({"replicas": 1})),
            ],
        );
        let mut live = BTreeMap::new();
        live.insert(key("stale-a"), owned("stale-a", json!({})));
        live.insert(key("stale-b"), owned("stale-b", json!({})));

        let first = diff(APP, &declared, &live, true);
        for _ in 0..10 {
            assert_eq!(diff(APP, &declared, &live, true), first);
        }
    }

    #[test]
    fn test_nested_managed_comparison_ignores_extra_live_fields() {
        let declared = json!({"template": {"containers": [{"image": "vote:v2"}]}});
        let live_equal = json!({
            "template": {"containers": [{"image": "vote:v2", "imagePullPolicy": "Always"}]},
            "status": {"readyReplicas": 2}
        });
        assert!(managed_fields_equal(&declared, &live_equal));

        let live_drifted = json!({"template": {"containers": [{"image": "vote:v1"}]}});
        assert!(!managed_fields_equal(&declared, &live_drifted));
    }

    #[test]
    fn test_array_length_change_is_drift() {
        let declared = json!({"ports": [80, 443]});
        assert!(!managed_fields_equal(&declared, &json!({"ports": [80]})));
        assert!(managed_fields_equal(&declared, &json!({"ports": [80, 443]})));
    }
}
