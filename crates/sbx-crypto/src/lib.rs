//! sbx-crypto: password-based at-rest encryption for sealbox
//!
//! Envelope layout (positional, no magic, no version byte, no tag):
//! ```text
//! [16 bytes: salt][16 bytes: IV][N bytes: AES-256-CBC ciphertext, PKCS#7 padded]
//! ```
//!
//! Key = PBKDF2-HMAC-SHA256(password, salt, 100_000 rounds, 32 bytes).
//!
//! There is no authentication tag: a wrong password, a flipped ciphertext
//! bit, and a padding failure all surface as the same
//! [`EnvelopeError::DecryptionFailed`]. PKCS#7 validation also accepts roughly
//! one wrong key in 256, in which case decryption "succeeds" with garbage.
//! Adding an AEAD would change the wire format and break existing envelopes.

pub mod envelope;
pub mod error;
pub mod file;
pub mod kdf;

pub use envelope::{
    ciphertext_len, decrypt, decrypt_with_params, encrypt, encrypt_with_params,
};
pub use error::{EnvelopeError, EnvelopeResult};
pub use file::{decrypt_file, encrypt_file};
pub use kdf::{derive_key, DerivedKey, KdfParams};

/// Size of a derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the per-envelope KDF salt
pub const SALT_SIZE: usize = 16;

/// Size of the CBC initialization vector (one AES block)
pub const IV_SIZE: usize = 16;

/// Fixed envelope header: salt followed by IV
pub const HEADER_SIZE: usize = SALT_SIZE + IV_SIZE;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// PBKDF2 round count; changing it breaks every existing envelope
pub const PBKDF2_ITERATIONS: u32 = 100_000;
