//! sbx-storage: content-addressed storage capability for sealbox
//!
//! Every backend stores opaque bytes under the lowercase hex BLAKE3 hash of
//! those bytes, so an id issued by one backend is meaningful to any other.
//!
//! ```text
//! FallbackStorage
//!   ├── primary:  OperatorBackend (OpenDAL: S3-compatible or in-memory)
//!   └── fallback: LocalBackend    (directory on the local filesystem)
//! ```

pub mod backend;
pub mod error;
pub mod fallback;
pub mod health;
pub mod local;
pub mod operator;

pub use backend::{content_id, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use fallback::{build_storage, FallbackStorage};
pub use health::check_health;
pub use local::LocalBackend;
pub use operator::{build_primary, OperatorBackend, S3Credentials};
