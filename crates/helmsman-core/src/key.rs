use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Composite identity of a managed resource: `kind/namespace/name`.
///
/// Keys are the join point between declared specs, live resources, change
/// operations and the dependency graph, so they are cheap to clone, hashable
/// and totally ordered (kind, then namespace, then name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses a `kind/namespace/name` triple, rejecting empty segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('/').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::invalid_key(raw));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl FromStr for ResourceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let key = ResourceKey::parse("Deployment/default/vote").unwrap();
        assert_eq!(key.kind, "Deployment");
        assert_eq!(key.namespace, "default");
        assert_eq!(key.name, "vote");
        assert_eq!(key.to_string(), "Deployment/default/vote");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ResourceKey::parse("Deployment/vote").is_err());
        assert!(ResourceKey::parse("Deployment//vote").is_err());
        assert!(ResourceKey::parse("").is_err());
        assert!(ResourceKey::parse("a/b/c/d").is_err());
    }

    #[test]
    fn test_ordering_is_total() {
        let a = ResourceKey::new("ConfigMap", "default", "a");
        let b = ResourceKey::new("Deployment", "default", "a");
        let c = ResourceKey::new("Deployment", "default", "b");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_from_str() {
        let key: ResourceKey = "Service/prod/result".parse().unwrap();
        assert_eq!(key, ResourceKey::new("Service", "prod", "result"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let key = ResourceKey::new("Service", "default", "redis");
        let json = serde_json::to_string(&key).unwrap();
        let back: ResourceKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
