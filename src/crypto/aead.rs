//! Sealed-blob format: `nonce(12) || ciphertext || tag(16)`.
//!
//! Every encrypted column (`encrypted_dek`, `encrypted_key`,
//! `encrypted_value`, `encrypted_fields`, `encrypted_bindings`,
//! `encrypted_metadata`) uses this exact layout, so each blob carries its
//! own nonce and authentication tag and can be decrypted independently.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::error::{Error, Result};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Encrypts `plaintext` under `key`, producing `nonce || ciphertext || tag`.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| Error::DecryptFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a blob produced by [`seal`]. Rejects anything shorter than
/// `nonce + tag` and surfaces authentication failure as [`Error::DecryptFailed`].
pub fn open(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::DecryptFailed);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn roundtrip() {
        let k = key(1);
        let blob = seal(&k, b"top secret value").unwrap();
        let back = open(&k, &blob).unwrap();
        assert_eq!(back, b"top secret value");
    }

    #[test]
    fn fresh_nonce_each_call() {
        let k = key(2);
        let a = seal(&k, b"same plaintext").unwrap();
        let b = seal(&k, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let blob = seal(&key(3), b"data").unwrap();
        assert!(matches!(open(&key(4), &blob), Err(Error::DecryptFailed)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let k = key(5);
        let mut blob = seal(&k, b"data").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(open(&k, &blob), Err(Error::DecryptFailed)));
    }

    #[test]
    fn truncated_blob_fails() {
        let k = key(6);
        assert!(matches!(open(&k, &[0u8; 10]), Err(Error::DecryptFailed)));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let k = key(7);
        let blob = seal(&k, b"").unwrap();
        assert_eq!(open(&k, &blob).unwrap(), b"");
    }
}
