//! Dependency graph, cycle detection and change-op ordering.
//!
//! The graph is an explicit adjacency structure keyed by resource identity,
//! with no ownership semantics, so cycle detection and topological sorting
//! stay simple and testable in isolation.

use std::collections::{BTreeMap, BTreeSet};

use helmsman_core::{ChangeOp, DeclaredSnapshot, ResourceKey};

use crate::error::{EngineError, Result};

/// Dependency relationships among one application's declared resources.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// node -> its prerequisites, restricted to declared keys.
    deps: BTreeMap<ResourceKey, Vec<ResourceKey>>,
    /// Declared source-path order, the stable tie-breaker.
    order_index: BTreeMap<ResourceKey, usize>,
}

impl DependencyGraph {
    /// Builds the graph from a declared snapshot. Dependency references
    /// naming keys outside the declared set are ignored for ordering: the
    /// referenced resource may be managed elsewhere and cannot constrain
    /// this application's sort.
    pub fn from_snapshot(snapshot: &DeclaredSnapshot) -> Self {
        let declared: BTreeSet<&ResourceKey> = snapshot.specs.iter().map(|s| &s.key).collect();
        let mut graph = Self::default();
        for (index, spec) in snapshot.specs.iter().enumerate() {
            let deps = spec
                .depends_on
                .iter()
                .filter(|dep| declared.contains(dep))
                .cloned()
                .collect();
            graph.deps.insert(spec.key.clone(), deps);
            graph.order_index.insert(spec.key.clone(), index);
        }
        graph
    }

    fn declared_order(&self, key: &ResourceKey) -> usize {
        self.order_index.get(key).copied().unwrap_or(usize::MAX)
    }

    /// Topological waves over all declared nodes: every node appears in a
    /// level strictly after all of its prerequisites, nodes within a level
    /// are mutually independent, and ties are broken by declared order.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` naming the unresolved members when the graph
    /// contains a cycle.
    pub fn topo_levels(&self) -> Result<Vec<Vec<ResourceKey>>> {
        let mut indegree: BTreeMap<ResourceKey, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<ResourceKey, Vec<ResourceKey>> = BTreeMap::new();
        for (node, deps) in &self.deps {
            indegree.entry(node.clone()).or_insert(0);
            for dep in deps {
                *indegree.entry(node.clone()).or_insert(0) += 1;
                dependents.entry(dep.clone()).or_default().push(node.clone());
            }
        }

        let mut ready: Vec<ResourceKey> = indegree
            .iter()
            .filter_map(|(node, degree)| (*degree == 0).then(|| node.clone()))
            .collect();
        ready.sort_by_key(|node| self.declared_order(node));

        let mut levels = Vec::new();
        let mut resolved = 0usize;
        while !ready.is_empty() {
            let mut next = Vec::new();
            for node in &ready {
                let Some(deps) = dependents.get(node) else {
                    continue;
                };
                for dependent in deps.clone() {
                    if let Some(degree) = indegree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            resolved += ready.len();
            next.sort_by_key(|node| self.declared_order(node));
            levels.push(std::mem::replace(&mut ready, next));
        }

        if resolved < self.deps.len() {
            let resolved_keys: BTreeSet<ResourceKey> =
                levels.iter().flatten().cloned().collect();
            let members: Vec<String> = self
                .deps
                .keys()
                .filter(|node| !resolved_keys.contains(node))
                .map(|node| node.to_string())
                .collect();
            return Err(EngineError::cycle_detected(members));
        }
        Ok(levels)
    }

    /// Sequences a change set into execution levels.
    ///
    /// Create/Update ops follow the topological waves, so a dependency is
    /// applied no later than its dependents; Invalid ops go first (they
    /// never touch the target); Delete ops run last in reverse dependency
    /// order, dependents removed before their dependencies; NoOps are
    /// dropped. On a cycle nothing is sequenced and zero ops get applied.
    pub fn order_ops(&self, ops: Vec<ChangeOp>) -> Result<Vec<Vec<ChangeOp>>> {
        let topo = self.topo_levels()?;

        let mut invalid = Vec::new();
        let mut applies: BTreeMap<ResourceKey, ChangeOp> = BTreeMap::new();
        let mut deletes: BTreeMap<ResourceKey, ChangeOp> = BTreeMap::new();
        for op in ops {
            match &op {
                ChangeOp::Invalid { .. } => invalid.push(op),
                ChangeOp::Create { .. } | ChangeOp::Update { .. } => {
                    applies.insert(op.key().clone(), op);
                }
                ChangeOp::Delete { .. } => {
                    deletes.insert(op.key().clone(), op);
                }
                ChangeOp::NoOp { .. } => {}
            }
        }

        let mut levels = Vec::new();
        if !invalid.is_empty() {
            invalid.sort_by(|a, b| a.key().cmp(b.key()));
            levels.push(invalid);
        }

        for wave in &topo {
            let level: Vec<ChangeOp> = wave
                .iter()
                .filter_map(|key| applies.remove(key))
                .collect();
            if !level.is_empty() {
                levels.push(level);
            }
        }

        // Pruned resources are no longer declared, so the current graph has
        // no edges for them; reverse waves cover keys that are still in the
        // graph, the rest run as one final level in reverse key order.
        for wave in topo.iter().rev() {
            let level: Vec<ChangeOp> = wave
                .iter()
                .filter_map(|key| deletes.remove(key))
                .collect();
            if !level.is_empty() {
                levels.push(level);
            }
        }
        if !deletes.is_empty() {
            let mut rest: Vec<ChangeOp> = deletes.into_values().collect();
            rest.sort_by(|a, b| b.key().cmp(a.key()));
            levels.push(rest);
        }

        Ok(levels)
    }
}
