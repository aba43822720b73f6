//! Directory-tree declared-state source.
//!
//! Layout: `<root>/<revision>/**/*.json`, one resource document per file,
//! plus a `HEAD` file at the root naming the current revision. This mirrors
//! a checked-out versioned tree without binding the controller to any
//! particular version-control client.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use helmsman_core::{DeclaredSnapshot, ResourceKey, ResourceSpec};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::SourceError;
use crate::traits::DeclaredSource;

/// One declared resource document as stored on disk.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecDocument {
    kind: String,
    namespace: String,
    name: String,
    #[serde(default)]
    depends_on: Vec<String>,
    spec: Value,
}

/// Declared-state source reading resource documents from a directory tree.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn head(&self) -> Result<String, SourceError> {
        let head_path = self.root.join("HEAD");
        let head = std::fs::read_to_string(&head_path).map_err(|e| {
            SourceError::unavailable(format!("cannot read {}: {e}", head_path.display()))
        })?;
        let head = head.trim().to_string();
        if head.is_empty() {
            return Err(SourceError::unavailable(format!(
                "{} is empty",
                head_path.display()
            )));
        }
        Ok(head)
    }

    fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), SourceError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SourceError::unavailable(format!("cannot list {}: {e}", dir.display())))?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                SourceError::unavailable(format!("cannot list {}: {e}", dir.display()))
            })?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_files(&path, files)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Parses one document. A document that cannot be parsed becomes a
    /// malformed spec keyed by its file stem, so the diff reports it instead
    /// of dropping it.
    fn parse_document(path: &Path, rel: &str, raw: &str, revision: &str) -> ResourceSpec {
        let fallback_key = || {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown");
            ResourceKey::new("Spec", "source", stem)
        };

        let doc: SpecDocument = match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                return ResourceSpec::malformed(fallback_key(), e.to_string(), revision)
                    .with_source_path(rel);
            }
        };

        if doc.kind.is_empty() || doc.namespace.is_empty() || doc.name.is_empty() {
            return ResourceSpec::malformed(
                fallback_key(),
                "kind, namespace and name must be non-empty",
                revision,
            )
            .with_source_path(rel);
        }

        let key = ResourceKey::new(doc.kind, doc.namespace, doc.name);
        let mut deps = Vec::with_capacity(doc.depends_on.len());
        for dep in &doc.depends_on {
            match ResourceKey::parse(dep) {
                Ok(dep_key) => deps.push(dep_key),
                Err(e) => {
                    return ResourceSpec::malformed(
                        key,
                        format!("invalid dependsOn entry {dep:?}: {e}"),
                        revision,
                    )
                    .with_source_path(rel);
                }
            }
        }

        ResourceSpec::new(key, doc.spec, revision)
            .with_depends_on(deps)
            .with_source_path(rel)
    }
}

#[async_trait]
impl DeclaredSource for DirSource {
    async fn fetch(&self, revision: Option<&str>) -> Result<DeclaredSnapshot, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::unavailable(format!(
                "source root {} does not exist",
                self.root.display()
            )));
        }

        let revision = match revision {
            Some(rev) => rev.to_string(),
            None => self.head()?,
        };

        let rev_dir = self.root.join(&revision);
        if !rev_dir.is_dir() {
            return Err(SourceError::revision_not_found(&revision));
        }

        let mut files = Vec::new();
        Self::collect_files(&rev_dir, &mut files)?;

        let mut specs = Vec::with_capacity(files.len());
        for path in files {
            let rel = path
                .strip_prefix(&rev_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                SourceError::unavailable(format!("cannot read {}: {e}", path.display()))
            })?;
            specs.push(Self::parse_document(&path, &rel, &raw, &revision));
        }

        debug!(revision = %revision, specs = specs.len(), "Declared snapshot loaded");
        Ok(DeclaredSnapshot::new(revision, specs))
    }

    fn source_name(&self) -> &'static str {
        "dir"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn doc(kind: &str, name: &str, deps: &str, spec: &str) -> String {
        format!(
            r#"{{"kind":"{kind}","namespace":"default","name":"{name}","dependsOn":[{deps}],"spec":{spec}}}"#
        )
    }

    #[tokio::test]
    async fn test_fetch_head_revision() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "HEAD", "r1\n");
        write(
            tmp.path(),
            "r1/10-redis.json",
            &doc("Service", "redis", "", r#"{"port":6379}"#),
        );
        write(
            tmp.path(),
            "r1/20-vote.json",
            &doc(
                "Deployment",
                "vote",
                r#""Service/default/redis""#,
                r#"{"replicas":2}"#,
            ),
        );

        let source = DirSource::new(tmp.path());
        let snap = source.fetch(None).await.unwrap();
        assert_eq!(snap.revision, "r1");
        assert_eq!(snap.specs.len(), 2);
        // Ordered by source path
        assert_eq!(snap.specs[0].key.name, "redis");
        assert_eq!(snap.specs[1].key.name, "vote");
        assert_eq!(
            snap.specs[1].depends_on,
            vec![ResourceKey::new("Service", "default", "redis")]
        );
    }

    #[tokio::test]
    async fn test_pinned_revision_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "HEAD", "r1");
        std::fs::create_dir_all(tmp.path().join("r1")).unwrap();

        let source = DirSource::new(tmp.path());
        let err = source.fetch(Some("r9")).await.unwrap_err();
        assert!(matches!(err, SourceError::RevisionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_root_is_unavailable() {
        let source = DirSource::new("/nonexistent/helmsman-source");
        let err = source.fetch(None).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unparsable_document_becomes_malformed_spec() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "HEAD", "r1");
        write(tmp.path(), "r1/broken.json", "{ not json");

        let source = DirSource::new(tmp.path());
        let snap = source.fetch(None).await.unwrap();
        assert_eq!(snap.specs.len(), 1);
        assert!(snap.specs[0].payload.is_malformed());
        assert_eq!(snap.specs[0].key.name, "broken");
    }

    #[tokio::test]
    async fn test_bad_dependency_reference_becomes_malformed_spec() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "HEAD", "r1");
        write(
            tmp.path(),
            "r1/vote.json",
            &doc("Deployment", "vote", r#""redis""#, "{}"),
        );

        let source = DirSource::new(tmp.path());
        let snap = source.fetch(None).await.unwrap();
        assert!(snap.specs[0].payload.is_malformed());
        // The envelope parsed, so the real key is kept.
        assert_eq!(snap.specs[0].key.name, "vote");
    }

    #[tokio::test]
    async fn test_missing_head_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("r1")).unwrap();

        let source = DirSource::new(tmp.path());
        let err = source.fetch(None).await.unwrap_err();
        assert!(matches!(err, SourceError::SourceUnavailable { .. }));
    }
}
