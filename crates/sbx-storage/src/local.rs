//! Local-directory backend, used as the fallback when the primary errors

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{content_id, validate_id, StorageBackend};
use crate::error::{StorageError, StorageResult};

/// Stores each object as `{root}/{content-id}`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, bytes: &[u8]) -> StorageResult<String> {
        let id = content_id(bytes);
        let path = self.path_for(&id)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io(&self.root, e))?;

        // Write to a hidden temp file, then rename into place
        let tmp = self.root.join(format!(".{id}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        debug!(id = %id, bytes = bytes.len(), root = %self.root.display(), "local upload");
        Ok(id)
    }

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.root, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.root, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path().join("objects"));

        let id = backend.upload(b"local bytes").await.unwrap();
        assert_eq!(id, content_id(b"local bytes"));
        assert_eq!(backend.download(&id).await.unwrap(), b"local bytes");
    }

    #[tokio::test]
    async fn test_download_missing() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path());

        let err = backend.download(&content_id(b"never stored")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path());

        let id = backend.upload(b"to be deleted").await.unwrap();
        assert!(backend.delete(&id).await.unwrap());
        assert!(!backend.delete(&id).await.unwrap());
        assert!(backend.download(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_snapshot() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path().join("store"));
        assert!(backend.list().await.unwrap().is_empty(), "missing root lists empty");

        let a = backend.upload(b"a").await.unwrap();
        let b = backend.upload(b"b").await.unwrap();
        // Same content, same id
        assert_eq!(backend.upload(b"a").await.unwrap(), a);

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(backend.list().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path().join("store"));

        let err = backend.download("../secret").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidId(_)));
    }
}
