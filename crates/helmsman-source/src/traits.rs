//! The declared-state source trait.

use async_trait::async_trait;
use helmsman_core::DeclaredSnapshot;

use crate::error::SourceError;

/// A versioned, read-only collection of declared resource specifications.
///
/// Implementations must be thread-safe (`Send + Sync`); the same source may
/// back several applications' reconciliation loops.
#[async_trait]
pub trait DeclaredSource: Send + Sync {
    /// Fetches the declared snapshot at the given revision, or at the
    /// source's current head when `revision` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::SourceUnavailable` when the backend cannot be
    /// reached and `SourceError::RevisionNotFound` when a pinned revision no
    /// longer exists.
    async fn fetch(&self, revision: Option<&str>) -> Result<DeclaredSnapshot, SourceError>;

    /// Name of this source backend for logging/debugging.
    fn source_name(&self) -> &'static str;
}
