use std::path::PathBuf;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {id}")]
    NotFound { id: String },

    #[error("invalid object id: {0:?}")]
    InvalidId(String),

    #[error("{backend} backend error: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: opendal::Error,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("primary failed ({primary}); fallback failed ({fallback})")]
    FallbackFailed {
        primary: Box<StorageError>,
        #[source]
        fallback: Box<StorageError>,
    },

    #[error("unsupported backend kind: {0:?} (expected \"s3\" or \"memory\")")]
    UnsupportedBackend(String),

    #[error("storage config error: {0}")]
    Config(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn from_opendal(backend: &'static str, id: &str, source: opendal::Error) -> Self {
        if source.kind() == opendal::ErrorKind::NotFound {
            Self::NotFound { id: id.to_string() }
        } else {
            Self::Backend { backend, source }
        }
    }

    /// True if no backend holds the requested object
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::FallbackFailed { primary, fallback } => {
                primary.is_not_found() && fallback.is_not_found()
            }
            _ => false,
        }
    }
}
