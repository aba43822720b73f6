//! Error types for declared-state sources.

use thiserror::Error;

/// Errors that can occur while reading the declared-state source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The declared-state backend cannot be reached. Transient: the cached
    /// snapshot may be served while this persists.
    #[error("Source unavailable: {message}")]
    SourceUnavailable {
        /// Description of the transport failure.
        message: String,
    },

    /// A pinned revision no longer exists in the source. Structural: retrying
    /// the same revision cannot succeed.
    #[error("Revision not found: {revision}")]
    RevisionNotFound {
        /// The revision that was requested.
        revision: String,
    },
}

impl SourceError {
    /// Creates a new `SourceUnavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `RevisionNotFound` error.
    #[must_use]
    pub fn revision_not_found(revision: impl Into<String>) -> Self {
        Self::RevisionNotFound {
            revision: revision.into(),
        }
    }

    /// Returns `true` when retrying (or serving a cached snapshot) makes
    /// sense for this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
