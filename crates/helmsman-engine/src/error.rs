use helmsman_source::SourceError;
use helmsman_target::TargetError;
use thiserror::Error;

/// Errors produced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The declared dependency graph contains a cycle. Structural: surfaced
    /// as Degraded with the cycle members, never retried by the executor.
    #[error("Dependency cycle detected among: {members}")]
    CycleDetected {
        /// Display keys of the resources participating in the cycle.
        members: String,
    },

    #[error("Application already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Application not registered: {0}")]
    NotRegistered(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Target(#[from] TargetError),
}

impl EngineError {
    /// Creates a new `CycleDetected` error from the cycle members.
    #[must_use]
    pub fn cycle_detected<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let members: Vec<String> = members.into_iter().map(|m| m.to_string()).collect();
        Self::CycleDetected {
            members: members.join(", "),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Convenience result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
