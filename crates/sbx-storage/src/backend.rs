//! The storage capability contract

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Opaque, content-addressed byte storage.
///
/// Guarantees callers rely on:
///   - `upload` returns an id that retrieves the same bytes later
///   - `download` returns exactly those bytes, or `StorageError::NotFound`
///   - `delete` is idempotent: a missing id yields `Ok(false)`, not an error
///   - `list` is a finite snapshot
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    async fn upload(&self, bytes: &[u8]) -> StorageResult<String>;

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>>;

    /// Returns whether an object was actually removed.
    async fn delete(&self, id: &str) -> StorageResult<bool>;

    async fn list(&self) -> StorageResult<Vec<String>>;
}

/// Content id for a byte payload: lowercase hex BLAKE3.
pub fn content_id(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Reject ids that could escape a backend's namespace (`..`, `/`, etc).
pub(crate) fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}
