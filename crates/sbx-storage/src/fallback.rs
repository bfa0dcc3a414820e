//! Primary → local fallback composition
//!
//! Any primary error sends that single call to the fallback, once. There is
//! no retry of the primary and no memory between calls: the next call tries
//! the primary again. Deletes also sweep the fallback after a primary
//! success, since an object may have landed there during an outage.

use async_trait::async_trait;
use sbx_core::config::{expand_tilde, StorageConfig};
use tracing::warn;

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::local::LocalBackend;
use crate::operator::{build_primary, S3Credentials};

pub struct FallbackStorage {
    primary: Box<dyn StorageBackend>,
    fallback: Box<dyn StorageBackend>,
}

impl FallbackStorage {
    pub fn new(primary: Box<dyn StorageBackend>, fallback: Box<dyn StorageBackend>) -> Self {
        Self { primary, fallback }
    }

    fn note_fallback(&self, action: &str, id: Option<&str>, error: &StorageError) {
        warn!(
            action,
            id = id.unwrap_or("-"),
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            error = %error,
            "primary storage failed, using fallback"
        );
    }
}

fn both_failed(primary: StorageError, fallback: StorageError) -> StorageError {
    StorageError::FallbackFailed {
        primary: Box::new(primary),
        fallback: Box::new(fallback),
    }
}

#[async_trait]
impl StorageBackend for FallbackStorage {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn upload(&self, bytes: &[u8]) -> StorageResult<String> {
        match self.primary.upload(bytes).await {
            Ok(id) => Ok(id),
            Err(e) => {
                self.note_fallback("upload", None, &e);
                self.fallback
                    .upload(bytes)
                    .await
                    .map_err(|f| both_failed(e, f))
            }
        }
    }

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>> {
        match self.primary.download(id).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                self.note_fallback("download", Some(id), &e);
                self.fallback
                    .download(id)
                    .await
                    .map_err(|f| both_failed(e, f))
            }
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        match self.primary.delete(id).await {
            // Uploads made during a primary outage live only in the fallback,
            // so a healthy primary does not end the delete
            Ok(primary_removed) => match self.fallback.delete(id).await {
                Ok(fallback_removed) => Ok(primary_removed || fallback_removed),
                Err(f) => {
                    warn!(
                        id,
                        fallback = self.fallback.name(),
                        error = %f,
                        "fallback delete failed after primary delete"
                    );
                    Ok(primary_removed)
                }
            },
            Err(e) => {
                self.note_fallback("delete", Some(id), &e);
                self.fallback
                    .delete(id)
                    .await
                    .map_err(|f| both_failed(e, f))
            }
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        match self.primary.list().await {
            Ok(ids) => Ok(ids),
            Err(e) => {
                self.note_fallback("list", None, &e);
                self.fallback.list().await.map_err(|f| both_failed(e, f))
            }
        }
    }
}

/// Build the configured storage stack: the selected primary backend with a
/// local-directory fallback at `storage.fallback_dir`.
pub fn build_storage(
    storage: &StorageConfig,
    creds: Option<&S3Credentials>,
) -> StorageResult<FallbackStorage> {
    let primary = build_primary(storage, creds)?;
    let fallback = LocalBackend::new(expand_tilde(&storage.fallback_dir));
    Ok(FallbackStorage::new(Box::new(primary), Box::new(fallback)))
}
