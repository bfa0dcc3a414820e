//! Logical ID registry and lookup-or-pass-through resolution

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sbx_core::{FileRecord, UploadOptions};
use sbx_storage::StorageBackend;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Action, ResolverError, ResolverResult};

/// How a caller-supplied ID mapped onto the backend
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    /// Registered here; carries the stored backend ID
    Registered(String),
    /// Unknown here; the ID is handed to the backend as-is
    PassThrough(String),
}

impl Resolved {
    fn backend_id(&self) -> &str {
        match self {
            Resolved::Registered(id) | Resolved::PassThrough(id) => id,
        }
    }
}

/// Maps caller-visible logical IDs to backend IDs.
///
/// The registry lives in memory only. The map is written only after the
/// backend confirms success, and its lock is never held across a backend
/// call.
pub struct IdentityResolver {
    storage: Arc<dyn StorageBackend>,
    records: RwLock<HashMap<String, FileRecord>>,
}

impl IdentityResolver {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Upload the file at `path` and register it.
    ///
    /// Returns the logical ID: `options.id` if supplied, otherwise a fresh v4
    /// UUID. Re-uploading under an existing ID replaces its record.
    pub async fn upload(&self, path: &Path, options: UploadOptions) -> ResolverResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ResolverError::io(path, e))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        self.upload_bytes(&name, &bytes, options).await
    }

    /// Upload in-memory bytes under `display_name` and register them.
    pub async fn upload_bytes(
        &self,
        display_name: &str,
        bytes: &[u8],
        options: UploadOptions,
    ) -> ResolverResult<String> {
        let backend_id = self
            .storage
            .upload(bytes)
            .await
            .map_err(|e| ResolverError::storage(Action::Upload, display_name, e))?;

        let logical_id = options
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let record = FileRecord {
            logical_id: logical_id.clone(),
            backend_id,
            display_name: display_name.to_string(),
            size_bytes: bytes.len() as u64,
            content_type: options.content_type_or_default().to_string(),
            created_at: unix_now(),
            encrypted: options.encrypted,
        };

        info!(
            id = %logical_id,
            backend_id = %record.backend_id,
            name = %record.display_name,
            size = record.size_bytes,
            encrypted = record.encrypted,
            "registered file"
        );

        let replaced = self
            .records
            .write()
            .await
            .insert(logical_id.clone(), record);
        if let Some(old) = replaced {
            debug!(id = %logical_id, old_backend_id = %old.backend_id, "replaced existing record");
        }

        Ok(logical_id)
    }

    /// Fetch the content behind `id` and write it to `destination`.
    pub async fn download(&self, id: &str, destination: &Path) -> ResolverResult<PathBuf> {
        let bytes = self.download_bytes(id).await?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResolverError::io(parent, e))?;
        }
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| ResolverError::io(destination, e))?;

        debug!(id, dest = %destination.display(), bytes = bytes.len(), "downloaded");
        Ok(destination.to_path_buf())
    }

    /// Fetch the content behind `id`.
    pub async fn download_bytes(&self, id: &str) -> ResolverResult<Vec<u8>> {
        let resolved = self.resolve(id).await;
        self.storage
            .download(resolved.backend_id())
            .await
            .map_err(|e| ResolverError::storage(Action::Download, id, e))
    }

    /// Delete the content behind `id`.
    ///
    /// Returns the backend's report of whether an object was removed. A
    /// registered ID is unregistered once the backend call succeeds, even if
    /// the object was already gone.
    ///
    /// Identical content shares one backend object, so while another logical
    /// ID still points at it the object is kept and only this ID is dropped.
    pub async fn delete(&self, id: &str) -> ResolverResult<bool> {
        let resolved = self.resolve(id).await;

        if let Resolved::Registered(backend_id) = &resolved {
            let mut records = self.records.write().await;
            let still_referenced = records
                .iter()
                .any(|(other, r)| other != id && &r.backend_id == backend_id);
            if still_referenced && records.get(id).is_some_and(|r| &r.backend_id == backend_id) {
                records.remove(id);
                debug!(id, backend_id = %backend_id, "unregistered, backend object still referenced");
                return Ok(true);
            }
        }

        let removed = self
            .storage
            .delete(resolved.backend_id())
            .await
            .map_err(|e| ResolverError::storage(Action::Delete, id, e))?;

        if let Resolved::Registered(backend_id) = &resolved {
            let mut records = self.records.write().await;
            // A concurrent re-upload may have re-pointed the ID meanwhile
            if records.get(id).is_some_and(|r| &r.backend_id == backend_id) {
                records.remove(id);
            }
        }

        debug!(id, backend_id = resolved.backend_id(), removed, "deleted");
        Ok(removed)
    }

    /// Snapshot of every registered record, oldest first.
    pub async fn list(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.logical_id.cmp(&b.logical_id))
        });
        records
    }

    pub async fn get(&self, id: &str) -> Option<FileRecord> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn resolve(&self, id: &str) -> Resolved {
        match self.records.read().await.get(id) {
            Some(record) => Resolved::Registered(record.backend_id.clone()),
            None => {
                debug!(id, "unregistered id, passing through to backend");
                Resolved::PassThrough(id.to_string())
            }
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
