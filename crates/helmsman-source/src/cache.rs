//! Snapshot cache with staleness tracking.
//!
//! Tolerates transient `SourceUnavailable` errors by serving the last
//! successfully fetched snapshot, marked stale once it exceeds a configured
//! age, so a flaky source does not stall reconciliation indefinitely while
//! staleness stays visible in the status.

use std::sync::Arc;
use std::time::Duration;

use helmsman_core::{DeclaredSnapshot, now_utc};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::SourceError;
use crate::traits::DeclaredSource;

/// A declared snapshot plus whether it was served past its staleness age.
#[derive(Debug, Clone)]
pub struct FetchedSnapshot {
    pub snapshot: DeclaredSnapshot,
    pub stale: bool,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    snapshot: DeclaredSnapshot,
    fetched_at: OffsetDateTime,
}

/// Read-through cache over a [`DeclaredSource`].
pub struct SnapshotCache {
    inner: Arc<dyn DeclaredSource>,
    stale_after: Duration,
    last_good: RwLock<Option<CachedEntry>>,
}

impl SnapshotCache {
    pub fn new(inner: Arc<dyn DeclaredSource>, stale_after: Duration) -> Self {
        Self {
            inner,
            stale_after,
            last_good: RwLock::new(None),
        }
    }

    /// Fetches a snapshot, falling back to the cached one on a transient
    /// source failure.
    ///
    /// # Errors
    ///
    /// `RevisionNotFound` always propagates (a cache cannot fix a structural
    /// error). `SourceUnavailable` propagates only when no cached snapshot
    /// exists yet.
    pub async fn fetch(&self, revision: Option<&str>) -> Result<FetchedSnapshot, SourceError> {
        match self.inner.fetch(revision).await {
            Ok(snapshot) => {
                let entry = CachedEntry {
                    snapshot: snapshot.clone(),
                    fetched_at: now_utc(),
                };
                *self.last_good.write().await = Some(entry);
                Ok(FetchedSnapshot {
                    snapshot,
                    stale: false,
                })
            }
            Err(err) if err.is_transient() => {
                let cached = self.last_good.read().await.clone();
                match cached {
                    Some(entry) => {
                        let age = now_utc() - entry.fetched_at;
                        let stale = age >= self.stale_after;
                        warn!(
                            source = self.inner.source_name(),
                            error = %err,
                            stale,
                            "Source unavailable, serving cached snapshot"
                        );
                        Ok(FetchedSnapshot {
                            snapshot: entry.snapshot,
                            stale,
                        })
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Backdates the cached snapshot, for staleness tests.
    #[doc(hidden)]
    pub async fn age_cache_by(&self, age: Duration) {
        if let Some(entry) = self.last_good.write().await.as_mut() {
            entry.fetched_at -= age;
        }
    }
}
