//! Envelope sealing/opening with AES-256-CBC
//!
//! Envelope format (binary, positional):
//! ```text
//! [16 bytes: PBKDF2 salt][16 bytes: CBC IV][N bytes: ciphertext + PKCS#7 padding]
//! ```
//!
//! `N` is always a non-zero multiple of 16: a plaintext that is already
//! block-aligned gains one full block of padding.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use secrecy::SecretString;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::kdf::{derive_key, DerivedKey, KdfParams};
use crate::{BLOCK_SIZE, HEADER_SIZE, IV_SIZE, SALT_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Ciphertext length produced for a plaintext of `plaintext_len` bytes.
pub fn ciphertext_len(plaintext_len: usize) -> usize {
    (plaintext_len / BLOCK_SIZE + 1) * BLOCK_SIZE
}

/// Encrypt `plaintext` under `password` with the baseline KDF parameters.
///
/// Returns `[salt][iv][ciphertext]`. A fresh salt and IV are drawn for every
/// call, so encrypting the same input twice yields different envelopes.
pub fn encrypt(plaintext: &[u8], password: &SecretString) -> EnvelopeResult<Vec<u8>> {
    encrypt_with_params(plaintext, password, &KdfParams::default())
}

/// Decrypt an envelope produced by [`encrypt`].
pub fn decrypt(envelope: &[u8], password: &SecretString) -> EnvelopeResult<Vec<u8>> {
    decrypt_with_params(envelope, password, &KdfParams::default())
}

/// [`encrypt`] with explicit KDF parameters. Envelopes sealed with
/// non-default parameters only open with the same parameters.
pub fn encrypt_with_params(
    plaintext: &[u8],
    password: &SecretString,
    params: &KdfParams,
) -> EnvelopeResult<Vec<u8>> {
    let (key, salt) = derive_key(password, None, params)?;

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    Ok(seal(&key, &salt, &iv, plaintext))
}

/// [`decrypt`] with explicit KDF parameters.
pub fn decrypt_with_params(
    envelope: &[u8],
    password: &SecretString,
    params: &KdfParams,
) -> EnvelopeResult<Vec<u8>> {
    if envelope.len() < HEADER_SIZE {
        return Err(EnvelopeError::MalformedInput {
            len: envelope.len(),
            min: HEADER_SIZE,
        });
    }

    let (salt_bytes, rest) = envelope.split_at(SALT_SIZE);
    let (iv_bytes, ciphertext) = rest.split_at(IV_SIZE);

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(salt_bytes);
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(iv_bytes);

    let (key, _) = derive_key(password, Some(salt), params)?;

    Aes256CbcDec::new(key.as_bytes().into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| {
            tracing::debug!(len = envelope.len(), "envelope rejected by cipher");
            EnvelopeError::DecryptionFailed
        })
}

/// Assemble `[salt][iv][ciphertext]` for an already-derived key.
fn seal(
    key: &DerivedKey,
    salt: &[u8; SALT_SIZE],
    iv: &[u8; IV_SIZE],
    plaintext: &[u8],
) -> Vec<u8> {
    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut envelope = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    envelope.extend_from_slice(salt);
    envelope.extend_from_slice(iv);
    envelope.extend_from_slice(&ciphertext);
    envelope
}
