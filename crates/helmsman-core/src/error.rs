use thiserror::Error;

/// Core error types shared across the Helmsman crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource key: {0}")]
    InvalidKey(String),

    #[error("Invalid resource spec at {path}: {message}")]
    InvalidSpec { path: String, message: String },

    #[error("Invalid revision identifier: {0}")]
    InvalidRevision(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a new InvalidKey error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey(key.into())
    }

    /// Create a new InvalidSpec error
    pub fn invalid_spec(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidRevision error
    pub fn invalid_revision(revision: impl Into<String>) -> Self {
        Self::InvalidRevision(revision.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
