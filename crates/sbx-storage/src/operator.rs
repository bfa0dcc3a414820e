//! OpenDAL-backed primary storage

use async_trait::async_trait;
use opendal::Operator;
use sbx_core::config::StorageConfig;
use tracing::debug;

use crate::backend::{content_id, validate_id, StorageBackend};
use crate::error::{StorageError, StorageResult};

/// S3 access credentials
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Credentials {
    /// Read AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY, falling back to the
    /// SBX_-prefixed variants.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .or_else(|_| std::env::var("SBX_ACCESS_KEY_ID"))
            .ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .or_else(|_| std::env::var("SBX_SECRET_ACCESS_KEY"))
            .ok()?;
        Some(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Content-addressed store on top of an OpenDAL operator.
///
/// Objects live at `{prefix}/{content-id}`.
#[derive(Debug, Clone)]
pub struct OperatorBackend {
    op: Operator,
    prefix: String,
    label: &'static str,
}

impl OperatorBackend {
    pub fn new(op: Operator, prefix: &str, label: &'static str) -> Self {
        Self {
            op,
            prefix: prefix.trim_matches('/').to_string(),
            label,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn path_for(&self, id: &str) -> StorageResult<String> {
        validate_id(id)?;
        Ok(if self.prefix.is_empty() {
            id.to_string()
        } else {
            format!("{}/{id}", self.prefix)
        })
    }

    fn list_dir(&self) -> String {
        if self.prefix.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", self.prefix)
        }
    }

    fn err(&self, id: &str, e: opendal::Error) -> StorageError {
        StorageError::from_opendal(self.label, id, e)
    }
}

#[async_trait]
impl StorageBackend for OperatorBackend {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn upload(&self, bytes: &[u8]) -> StorageResult<String> {
        let id = content_id(bytes);
        let path = self.path_for(&id)?;

        self.op
            .write(&path, bytes.to_vec())
            .await
            .map_err(|e| self.err(&id, e))?;

        debug!(backend = self.label, id = %id, bytes = bytes.len(), "upload");
        Ok(id)
    }

    async fn download(&self, id: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(id)?;
        let buf = self.op.read(&path).await.map_err(|e| self.err(id, e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let path = self.path_for(id)?;
        let existed = self.op.exists(&path).await.map_err(|e| self.err(id, e))?;
        if existed {
            self.op.delete(&path).await.map_err(|e| self.err(id, e))?;
        }
        debug!(backend = self.label, id = %id, existed, "delete");
        Ok(existed)
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let dir = self.list_dir();
        let entries = self.op.list(&dir).await.map_err(|e| self.err(&dir, e))?;

        let mut ids: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .map(|entry| entry.name().to_string())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Build an OpenDAL Operator for an S3-compatible content store.
///
/// Uses path-style addressing (the opendal default), which SeaweedFS and
/// MinIO require. No RetryLayer: a failing call falls back to local storage
/// instead of being retried.
pub fn build_s3_operator(storage: &StorageConfig, creds: &S3Credentials) -> StorageResult<Operator> {
    let endpoint = storage.endpoint();
    if endpoint.starts_with("http://") {
        if storage.enforce_tls {
            return Err(StorageError::Config(format!(
                "endpoint uses plaintext HTTP ({endpoint}), but enforce_tls is enabled. \
                 Use protocol = \"https\" or set storage.enforce_tls = false for local development."
            )));
        }
        tracing::warn!(
            endpoint = %endpoint,
            "storage endpoint uses plaintext HTTP; credentials are transmitted unencrypted"
        );
    }

    let builder = opendal::services::S3::default()
        .endpoint(&endpoint)
        .region(&storage.region)
        .bucket(&storage.bucket)
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);

    let op = Operator::new(builder)
        .map_err(|source| StorageError::Backend {
            backend: "s3",
            source,
        })?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();

    Ok(op)
}

/// Build an in-process OpenDAL memory operator.
pub fn build_memory_operator() -> StorageResult<Operator> {
    let op = Operator::new(opendal::services::Memory::default())
        .map_err(|source| StorageError::Backend {
            backend: "memory",
            source,
        })?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// Build the primary backend selected by `storage.backend_kind`.
///
/// Unknown kinds are rejected here rather than on first use.
pub fn build_primary(
    storage: &StorageConfig,
    creds: Option<&S3Credentials>,
) -> StorageResult<OperatorBackend> {
    match storage.backend_kind.as_str() {
        "s3" => {
            let creds = creds.ok_or_else(|| {
                StorageError::Config(
                    "s3 backend requires credentials \
                     (set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY)"
                        .into(),
                )
            })?;
            let op = build_s3_operator(storage, creds)?;
            Ok(OperatorBackend::new(op, &storage.prefix, "s3"))
        }
        "memory" => {
            let op = build_memory_operator()?;
            Ok(OperatorBackend::new(op, &storage.prefix, "memory"))
        }
        other => Err(StorageError::UnsupportedBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> S3Credentials {
        S3Credentials {
            access_key_id: "test-key".into(),
            secret_access_key: "test-secret".into(),
        }
    }

    fn memory_backend() -> OperatorBackend {
        OperatorBackend::new(build_memory_operator().unwrap(), "test", "memory")
    }

    #[test]
    fn test_build_s3_primary() {
        let storage = StorageConfig::default();
        let backend = build_primary(&storage, Some(&creds())).unwrap();
        assert_eq!(backend.name(), "s3");
    }

    #[test]
    fn test_s3_requires_credentials() {
        let err = build_primary(&StorageConfig::default(), None).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn test_unsupported_backend_kind() {
        let storage = StorageConfig {
            backend_kind: "ftp".into(),
            ..Default::default()
        };
        let err = build_primary(&storage, Some(&creds())).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedBackend(ref k) if k == "ftp"));
    }

    #[test]
    fn test_enforce_tls_rejects_http() {
        let mut storage = StorageConfig {
            enforce_tls: true,
            ..Default::default()
        };
        let err = build_s3_operator(&storage, &creds()).unwrap_err();
        assert!(err.to_string().contains("enforce_tls"));

        storage.backend.protocol = "https".into();
        assert!(build_s3_operator(&storage, &creds()).is_ok());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let dbg = format!("{:?}", creds());
        assert!(dbg.contains("test-key"));
        assert!(!dbg.contains("test-secret"));
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let backend = memory_backend();

        let id = backend.upload(b"primary bytes").await.unwrap();
        assert_eq!(id, content_id(b"primary bytes"));
        assert_eq!(backend.download(&id).await.unwrap(), b"primary bytes");
        assert_eq!(backend.list().await.unwrap(), vec![id.clone()]);

        assert!(backend.delete(&id).await.unwrap());
        assert!(!backend.delete(&id).await.unwrap());
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_download_missing() {
        let backend = memory_backend();
        let err = backend.download(&content_id(b"absent")).await.unwrap_err();
        assert!(err.is_not_found(), "got {err}");
    }
}
