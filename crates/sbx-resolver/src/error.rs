use std::path::PathBuf;

use sbx_storage::StorageError;
use thiserror::Error;

pub type ResolverResult<T> = Result<T, ResolverError>;

/// The resolver operation that was being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    Download,
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::Upload => "upload",
            Action::Download => "download",
            Action::Delete => "delete",
        })
    }
}

#[derive(Debug, Error)]
pub enum ResolverError {
    /// The storage capability (primary and fallback) failed
    #[error("{action} {target} failed: {source}")]
    OperationFailed {
        action: Action,
        target: String,
        #[source]
        source: StorageError,
    },

    /// Reading the upload source or writing the download destination failed
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolverError {
    pub(crate) fn storage(action: Action, target: &str, source: StorageError) -> Self {
        Self::OperationFailed {
            action,
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True if the source path or the backend object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::OperationFailed { source, .. } => source.is_not_found(),
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
        }
    }
}
