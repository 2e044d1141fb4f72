//! Cryptographic primitives: Argon2id key derivation, AES-256-GCM sealed
//! blobs, the key-name HMAC, and the audit-log HKDF sub-key.
//!
//! # Security
//!
//! - **KDF**: Argon2id, memory = 65536 KiB, iterations = 3, parallelism = 4,
//!   output = 32 bytes. These parameters are fixed; changing them breaks
//!   compatibility with existing vaults (spec §4.1).
//! - **AEAD**: AES-256-GCM. Sealed-blob layout is `nonce(12) || ciphertext ||
//!   tag(16)`, so every encrypted column is self-contained.
//! - **Key-name HMAC**: HMAC-SHA256 keyed by the DEK, used as a stable
//!   lookup tag that does not reveal key names without vault compromise.

pub mod aead;
pub mod hash;
pub mod kdf;
pub mod wipe;

pub use aead::{seal, open};
pub use hash::hash_key;
pub use kdf::derive_key;
pub use wipe::wipe;

use rand::rngs::OsRng;
use rand::RngCore;

/// Fills an array of `N` bytes from the CSPRNG; used for salts and the DEK.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}
