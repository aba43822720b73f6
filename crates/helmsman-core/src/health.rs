use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-resource health, aggregated to application health by worst-of.
///
/// `Unknown` is the initial state and the fallback whenever the target system
/// cannot be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HealthStatus {
    Progressing,
    Healthy,
    Degraded,
    Suspended,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Severity used for aggregation. Higher is worse:
    /// Degraded > Unknown > Progressing > Suspended > Healthy.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Suspended => 1,
            Self::Progressing => 2,
            Self::Unknown => 3,
            Self::Degraded => 4,
        }
    }

    /// The worse of two statuses.
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Aggregate application health: the worst status among constituents.
    /// An application with no resources is Healthy (nothing to converge).
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses
            .into_iter()
            .fold(Self::Healthy, |acc, s| acc.worst(s))
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progressing => write!(f, "Progressing"),
            Self::Healthy => write!(f, "Healthy"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Suspended => write!(f, "Suspended"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
