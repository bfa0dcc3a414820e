//! Key derivation: PBKDF2-HMAC-SHA256 password → AES-256 key

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::{KEY_SIZE, PBKDF2_ITERATIONS, SALT_SIZE};

/// A 256-bit key derived from a password and salt.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100_000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a password.
///
/// When `salt` is `None` a random 16-byte salt is generated. The salt actually
/// used is returned alongside the key so the caller can store it in the
/// envelope header (it does not need to be secret).
pub fn derive_key(
    password: &SecretString,
    salt: Option<[u8; SALT_SIZE]>,
    params: &KdfParams,
) -> EnvelopeResult<(DerivedKey, [u8; SALT_SIZE])> {
    if params.iterations == 0 {
        return Err(EnvelopeError::Kdf("iteration count must be non-zero".into()));
    }

    let salt = salt.unwrap_or_else(generate_salt);

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        &salt,
        params.iterations,
        &mut key,
    );

    Ok((DerivedKey::from_bytes(key), salt))
}
