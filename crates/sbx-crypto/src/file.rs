//! File-level wrappers around the envelope codec
//!
//! The whole file is materialized in memory; there is no streaming mode.

use std::path::Path;

use secrecy::SecretString;
use tracing::debug;

use crate::envelope::{decrypt, encrypt};
use crate::error::{EnvelopeError, EnvelopeResult};

/// Encrypt the file at `src` and write the envelope to `dst`.
///
/// Returns the number of envelope bytes written.
pub async fn encrypt_file(src: &Path, dst: &Path, password: &SecretString) -> EnvelopeResult<u64> {
    let plaintext = tokio::fs::read(src)
        .await
        .map_err(|e| EnvelopeError::io(src, e))?;

    let envelope = encrypt(&plaintext, password)?;
    write_output(dst, &envelope).await?;

    debug!(
        src = %src.display(),
        dst = %dst.display(),
        plaintext = plaintext.len(),
        envelope = envelope.len(),
        "encrypted file"
    );
    Ok(envelope.len() as u64)
}

/// Decrypt the envelope at `src` and write the plaintext to `dst`.
///
/// Nothing is written when decryption fails.
pub async fn decrypt_file(src: &Path, dst: &Path, password: &SecretString) -> EnvelopeResult<u64> {
    let envelope = tokio::fs::read(src)
        .await
        .map_err(|e| EnvelopeError::io(src, e))?;

    let plaintext = decrypt(&envelope, password)?;
    write_output(dst, &plaintext).await?;

    debug!(
        src = %src.display(),
        dst = %dst.display(),
        plaintext = plaintext.len(),
        "decrypted file"
    );
    Ok(plaintext.len() as u64)
}

async fn write_output(dst: &Path, bytes: &[u8]) -> EnvelopeResult<()> {
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| EnvelopeError::io(parent, e))?;
    }
    tokio::fs::write(dst, bytes)
        .await
        .map_err(|e| EnvelopeError::io(dst, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ciphertext_len, HEADER_SIZE};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("plain.txt");
        let enc = tmp.path().join("out/plain.txt.enc");
        let dec = tmp.path().join("out/plain.txt");
        let content = b"file contents that should survive a round trip";
        std::fs::write(&src, content).unwrap();

        let password = SecretString::from("pw1");
        let written = encrypt_file(&src, &enc, &password).await.unwrap();
        assert_eq!(written as usize, HEADER_SIZE + ciphertext_len(content.len()));
        assert_ne!(std::fs::read(&enc).unwrap(), content);

        let restored = decrypt_file(&enc, &dec, &password).await.unwrap();
        assert_eq!(restored as usize, content.len());
        assert_eq!(std::fs::read(&dec).unwrap(), content);
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = encrypt_file(
            &tmp.path().join("nope.txt"),
            &tmp.path().join("nope.enc"),
            &SecretString::from("pw"),
        )
        .await
        .unwrap_err();

        assert!(err.is_not_found(), "expected NotFound, got {err}");
        assert!(err.to_string().contains("nope.txt"));
    }

    #[tokio::test]
    async fn test_malformed_envelope_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("short.enc");
        let dst = tmp.path().join("short.txt");
        std::fs::write(&src, [0u8; 10]).unwrap();

        let err = decrypt_file(&src, &dst, &SecretString::from("pw"))
            .await
            .unwrap_err();

        assert!(matches!(err, EnvelopeError::MalformedInput { len: 10, .. }));
        assert!(!dst.exists());
    }
}
