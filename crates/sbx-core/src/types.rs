use serde::{Deserialize, Serialize};

/// Content type recorded when the caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A registered file: the mapping from a caller-visible logical ID to the
/// identifier the storage backend assigned.
///
/// Records are replaced wholesale on re-upload, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Caller-facing identifier (generated UUID unless supplied)
    pub logical_id: String,
    /// Identifier understood by the storage backend (content hash)
    pub backend_id: String,
    /// File name of the uploaded source
    pub display_name: String,
    pub size_bytes: u64,
    pub content_type: String,
    /// Unix timestamp (seconds) of registration
    pub created_at: u64,
    /// Whether the stored bytes are an encrypted envelope
    pub encrypted: bool,
}

/// Options accepted by an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Use this logical ID instead of generating one
    pub id: Option<String>,
    pub content_type: Option<String>,
    pub encrypted: bool,
}

impl UploadOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}
