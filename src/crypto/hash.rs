//! Key-name HMAC: a stable lookup tag that does not reveal key names to
//! anyone without the DEK.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// `hex(HMAC-SHA256(DEK, key))`, used as the unique `key_hash` lookup column.
pub fn hash_key(dek: &[u8; 32], key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(dek).expect("HMAC accepts any key length");
    mac.update(key.as_bytes());
    let tag = mac.finalize().into_bytes();
    hex_encode(&tag)
}

/// Derives the 32-byte audit-chain HMAC key from the DEK via HKDF-SHA256
/// with info string `"audit-log-v1"`.
pub fn derive_audit_key(dek: &[u8; 32]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, dek);
    let mut okm = [0u8; 32];
    hk.expand(b"audit-log-v1", &mut okm)
        .map_err(|_| Error::VaultCorrupted("hkdf expand failed".to_string()))?;
    Ok(okm)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keys_hash_differently() {
        let dek = [1u8; 32];
        let a = hash_key(&dek, "api/openai");
        let b = hash_key(&dek, "api/anthropic");
        assert_ne!(a, b);
    }

    #[test]
    fn stable_for_same_key() {
        let dek = [1u8; 32];
        let a = hash_key(&dek, "db/prod");
        let b = hash_key(&dek, "db/prod");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_depends_on_dek() {
        let a = hash_key(&[1u8; 32], "same-key");
        let b = hash_key(&[2u8; 32], "same-key");
        assert_ne!(a, b);
    }

    #[test]
    fn hex_output_shape() {
        let tag = hash_key(&[0u8; 32], "x");
        assert_eq!(tag.len(), 64);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn audit_key_derivation_is_deterministic_and_dek_sensitive() {
        let dek1 = [3u8; 32];
        let dek2 = [4u8; 32];
        let a1 = derive_audit_key(&dek1).unwrap();
        let a2 = derive_audit_key(&dek1).unwrap();
        let b = derive_audit_key(&dek2).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }
}
