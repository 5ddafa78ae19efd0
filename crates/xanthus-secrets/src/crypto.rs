//! AES-256-GCM encryption keyed by the caller's bearer token.
//!
//! There is no separate master key: the cipher key is the SHA-256 digest of
//! the passphrase source, so the same token always derives the same key and
//! losing the token loses the secret. A fresh random nonce is prepended to
//! every ciphertext and the whole payload is base64-encoded for storage.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use xanthus_core::SecretString;
use zeroize::Zeroizing;

use crate::error::{Result, SecretError};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// Derive a 256-bit cipher key from `passphrase`.
fn derive_key(passphrase: &SecretString) -> Zeroizing<[u8; KEY_SIZE]> {
    let digest = Sha256::digest(passphrase.as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&digest);
    key
}

fn cipher_for(passphrase: &SecretString) -> Result<Aes256Gcm> {
    let key = derive_key(passphrase);
    Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))
}

/// Encrypt `plaintext` with a key derived from `passphrase`.
///
/// Returns `base64(nonce || ciphertext_with_tag)`. Two calls with the same
/// inputs never produce the same output.
pub fn encrypt(plaintext: &str, passphrase: &SecretString) -> Result<String> {
    let cipher = cipher_for(passphrase)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

    let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(payload))
}

/// Decrypt a payload produced by [`encrypt`].
///
/// Malformed encoding, truncated input, a wrong passphrase and tampering all
/// surface as [`SecretError::DecryptionFailed`].
pub fn decrypt(ciphertext: &str, passphrase: &SecretString) -> Result<String> {
    let payload = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| SecretError::DecryptionFailed(format!("base64 decode failed: {e}")))?;

    if payload.len() < NONCE_SIZE {
        return Err(SecretError::DecryptionFailed(
            "ciphertext too short".to_string(),
        ));
    }

    let (nonce_bytes, sealed) = payload.split_at(NONCE_SIZE);
    let cipher = cipher_for(passphrase)
        .map_err(|e| SecretError::DecryptionFailed(e.to_string()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| SecretError::DecryptionFailed("authentication failed".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| SecretError::DecryptionFailed(format!("invalid UTF-8: {e}")))
}
