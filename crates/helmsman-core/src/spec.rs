use crate::key::ResourceKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared payload of a resource spec.
///
/// A spec whose document could not be parsed is carried as `Malformed` so the
/// differ can surface it as a failed change operation instead of silently
/// dropping the resource from the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum SpecPayload {
    Parsed(Value),
    Malformed(String),
}

impl SpecPayload {
    pub fn parsed(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// One declared resource at one revision.
///
/// Specs are immutable: a new revision supersedes the whole spec, it is never
/// mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub key: ResourceKey,
    /// Declared configuration document.
    pub payload: SpecPayload,
    /// Revision identifier of the declaring commit.
    pub revision: String,
    /// Keys this resource depends on, in declared order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<ResourceKey>,
    /// Path of the declaring file inside the revision tree. Used as the
    /// stable secondary ordering key for deterministic diffs.
    pub source_path: String,
}

impl ResourceSpec {
    pub fn new(key: ResourceKey, payload: Value, revision: impl Into<String>) -> Self {
        let source_path = key.to_string();
        Self {
            key,
            payload: SpecPayload::Parsed(payload),
            revision: revision.into(),
            depends_on: Vec::new(),
            source_path,
        }
    }

    pub fn malformed(
        key: ResourceKey,
        error: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        let source_path = key.to_string();
        Self {
            key,
            payload: SpecPayload::Malformed(error.into()),
            revision: revision.into(),
            depends_on: Vec::new(),
            source_path,
        }
    }

    pub fn with_depends_on(mut self, deps: Vec<ResourceKey>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = path.into();
        self
    }
}

/// A full declared snapshot of one application at one revision.
///
/// Specs retain the order of their source paths within the revision tree;
/// that order is what makes the diff deterministic before topological
/// sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredSnapshot {
    pub revision: String,
    pub specs: Vec<ResourceSpec>,
}

impl DeclaredSnapshot {
    pub fn new(revision: impl Into<String>, mut specs: Vec<ResourceSpec>) -> Self {
        specs.sort_by(|a, b| {
            a.source_path
                .cmp(&b.source_path)
                .then_with(|| a.key.cmp(&b.key))
        });
        Self {
            revision: revision.into(),
            specs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceSpec> {
        self.specs.iter().find(|s| &s.key == key)
    }
}
