//! Error types for target system operations.

use thiserror::Error;

/// Errors that can occur against the target system.
#[derive(Debug, Error)]
pub enum TargetError {
    /// Transport-level failure reaching the target. Transient: applies are
    /// retried with bounded backoff.
    #[error("Target unavailable: {message}")]
    Unavailable {
        /// Description of the transport failure.
        message: String,
    },

    /// The target rejected the payload. Permanent: retrying the same payload
    /// cannot succeed.
    #[error("Apply rejected for {key}: {message}")]
    Rejected {
        /// Display form of the resource key.
        key: String,
        /// Description of the rejection.
        message: String,
    },

    /// An internal target error occurred.
    #[error("Internal target error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl TargetError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Rejected` error.
    #[must_use]
    pub fn rejected(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` when a retry may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
