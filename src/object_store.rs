//! Blob storage capability used by upload intake and the orchestrator.
//!
//! The pipeline only needs `put`/`get`/`exists`/`delete`; [`LocalObjectStore`] keeps blobs under a root
//! directory and hands out `file://` URIs. Remote stores implement [`ObjectStore`] and return
//! a temporary download from `get`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::ObjectStoreError;

const FILE_SCHEME: &str = "file://";

/// A locally readable copy of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    /// `true` when `path` is a download the caller must delete when done.
    pub temporary: bool,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, returning the object's URI.
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, ObjectStoreError>;

    /// Resolve `uri` to a locally readable path.
    async fn get(&self, uri: &str) -> Result<ResolvedArtifact, ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Remove the object under `key`. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create the store, creating `root` if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ObjectStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn path_for_uri(&self, uri: &str) -> Result<PathBuf, ObjectStoreError> {
        let raw = uri
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| ObjectStoreError::InvalidUri(uri.to_string()))?;
        let path = PathBuf::from(raw);
        if !path.starts_with(&self.root) || path.components().any(|c| c == Component::ParentDir) {
            return Err(ObjectStoreError::InvalidUri(uri.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, ObjectStoreError> {
        let path = self.path_for_key(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, bytes = bytes.len(), "object stored");
        Ok(format!("{FILE_SCHEME}{}", path.display()))
    }

    async fn get(&self, uri: &str) -> Result<ResolvedArtifact, ObjectStoreError> {
        let path = self.path_for_uri(uri)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(ObjectStoreError::NotFound(uri.to_string()));
        }
        Ok(ResolvedArtifact {
            path,
            temporary: false,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.path_for_key(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for_key(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Per-task directories are only ever created by `put`; drop them once empty.
        if let Some(parent) = path.parent().filter(|p| *p != self.root) {
            let _ = tokio::fs::remove_dir(parent).await;
        }
        tracing::debug!(key, "object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_resolves_to_the_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();

        let uri = store.put(b"a,b\n1,2\n", "task1/sales.csv").await.unwrap();
        assert!(uri.starts_with("file://"));
        assert!(store.exists("task1/sales.csv").await.unwrap());

        let artifact = store.get(&uri).await.unwrap();
        assert!(!artifact.temporary);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();

        for key in ["../evil.csv", "/etc/passwd", ""] {
            let err = store.put(b"x", key).await.unwrap_err();
            assert!(matches!(err, ObjectStoreError::InvalidKey(_)), "{key}");
        }
    }

    #[tokio::test]
    async fn foreign_uris_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.get("s3://bucket/x.csv").await.unwrap_err(),
            ObjectStoreError::InvalidUri(_)
        ));
        assert!(matches!(
            store.get("file:///definitely/not/here.csv").await.unwrap_err(),
            ObjectStoreError::InvalidUri(_)
        ));

        let missing = format!("file://{}", store.root().join("missing.csv").display());
        assert!(matches!(store.get(&missing).await.unwrap_err(), ObjectStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_object_and_its_task_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path()).unwrap();
        store.put(b"x", "task1/sales.csv").await.unwrap();

        store.delete("task1/sales.csv").await.unwrap();
        assert!(!store.exists("task1/sales.csv").await.unwrap());
        assert!(!store.root().join("task1").exists());

        // Already gone.
        store.delete("task1/sales.csv").await.unwrap();
        assert!(matches!(
            store.delete("../evil.csv").await.unwrap_err(),
            ObjectStoreError::InvalidKey(_)
        ));
    }
}
