//! In-memory revision store, used by tests and embedded setups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use helmsman_core::{DeclaredSnapshot, ResourceSpec};
use tokio::sync::RwLock;

use crate::error::SourceError;
use crate::traits::DeclaredSource;

/// A declared-state source backed by an in-memory revision map.
///
/// Revisions are pushed wholesale; the most recently pushed revision becomes
/// the head. The source can be flipped unavailable to exercise the cache and
/// error paths.
#[derive(Debug, Default)]
pub struct MemorySource {
    revisions: RwLock<HashMap<String, Vec<ResourceSpec>>>,
    head: RwLock<Option<String>>,
    unavailable: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a revision and makes it the head.
    pub async fn push_revision(&self, revision: impl Into<String>, specs: Vec<ResourceSpec>) {
        let revision = revision.into();
        self.revisions
            .write()
            .await
            .insert(revision.clone(), specs);
        *self.head.write().await = Some(revision);
    }

    /// Simulates a transport outage. While set, every fetch fails with
    /// `SourceUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeclaredSource for MemorySource {
    async fn fetch(&self, revision: Option<&str>) -> Result<DeclaredSnapshot, SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable("memory source marked unavailable"));
        }

        let requested = match revision {
            Some(rev) => rev.to_string(),
            None => self
                .head
                .read()
                .await
                .clone()
                .ok_or_else(|| SourceError::unavailable("memory source has no revisions"))?,
        };

        let revisions = self.revisions.read().await;
        let specs = revisions
            .get(&requested)
            .ok_or_else(|| SourceError::revision_not_found(&requested))?;
        Ok(DeclaredSnapshot::new(requested, specs.clone()))
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::ResourceKey;
    use serde_json::json;

    fn spec(name: &str, revision: &str) -> ResourceSpec {
        ResourceSpec::new(
            ResourceKey::new("Deployment", "default", name),
            json!({"replicas": 1}),
            revision,
        )
    }

    #[tokio::test]
    async fn test_fetch_head_follows_latest_push() {
        let source = MemorySource::new();
        source.push_revision("r1", vec![spec("vote", "r1")]).await;
        source
            .push_revision("r2", vec![spec("vote", "r2"), spec("result", "r2")])
            .await;

        let snap = source.fetch(None).await.unwrap();
        assert_eq!(snap.revision, "r2");
        assert_eq!(snap.specs.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_pinned_revision() {
        let source = MemorySource::new();
        source.push_revision("r1", vec![spec("vote", "r1")]).await;
        source.push_revision("r2", vec![]).await;

        let snap = source.fetch(Some("r1")).await.unwrap();
        assert_eq!(snap.revision, "r1");
        assert_eq!(snap.specs.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_revision_is_not_found() {
        let source = MemorySource::new();
        source.push_revision("r1", vec![]).await;

        let err = source.fetch(Some("gone")).await.unwrap_err();
        assert!(matches!(err, SourceError::RevisionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_source() {
        let source = MemorySource::new();
        source.push_revision("r1", vec![]).await;
        source.set_unavailable(true);

        let err = source.fetch(None).await.unwrap_err();
        assert!(err.is_transient());

        source.set_unavailable(false);
        assert!(source.fetch(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_source_is_unavailable() {
        let source = MemorySource::new();
        let err = source.fetch(None).await.unwrap_err();
        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
    }
}
