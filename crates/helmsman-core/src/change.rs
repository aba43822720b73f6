use crate::key::ResourceKey;
use crate::live::LiveResource;
use crate::spec::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One required mutation computed by the differ.
///
/// Change ops are produced fresh each reconciliation cycle and never
/// persisted. `Invalid` is the synthetic op emitted for a spec whose declared
/// payload could not be parsed; the executor turns it straight into a failed
/// sync result without touching the target, so the problem stays visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ChangeOp {
    Create {
        spec: ResourceSpec,
    },
    Update {
        spec: ResourceSpec,
        prior: Box<LiveResource>,
    },
    Delete {
        key: ResourceKey,
        prior: Box<LiveResource>,
    },
    NoOp {
        key: ResourceKey,
    },
    Invalid {
        key: ResourceKey,
        reason: String,
    },
}

/// Discriminant of a [`ChangeOp`], used for summaries and ordering decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    NoOp,
    Invalid,
}

impl ChangeOp {
    pub fn key(&self) -> &ResourceKey {
        match self {
            Self::Create { spec } | Self::Update { spec, .. } => &spec.key,
            Self::Delete { key, .. } | Self::NoOp { key } | Self::Invalid { key, .. } => key,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Create { .. } => ChangeKind::Create,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
            Self::NoOp { .. } => ChangeKind::NoOp,
            Self::Invalid { .. } => ChangeKind::Invalid,
        }
    }

    /// Whether this op requires a write against the target system.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Update { .. } | Self::Delete { .. }
        )
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::NoOp => write!(f, "noop"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}
