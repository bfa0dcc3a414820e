use std::path::PathBuf;

use thiserror::Error;

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Input is shorter than the fixed salt + IV header
    #[error("malformed envelope: {len} bytes (minimum {min})")]
    MalformedInput { len: usize, min: usize },

    /// Wrong password, corrupted ciphertext, or bad padding
    #[error("decryption failed: wrong password or corrupted data")]
    DecryptionFailed,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EnvelopeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True if the error came from a missing source file
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
