//! Argon2id key derivation: master password + salt -> 32-byte KEK.

use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::{Error, Result};

/// Memory cost in KiB. Fixed per spec; do not change without a migration.
pub const ARGON2_MEMORY_KIB: u32 = 65_536;
/// Iteration count. Fixed per spec.
pub const ARGON2_ITERATIONS: u32 = 3;
/// Parallelism. Fixed per spec.
pub const ARGON2_PARALLELISM: u32 = 4;
/// Output key length in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the per-vault salt, in bytes.
pub const SALT_LEN: usize = 16;

/// Derives a 32-byte key-encryption key from a master password and a 16-byte
/// salt, using the fixed Argon2id parameters mandated by the spec.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LEN),
    )
    .map_err(|e| Error::VaultCorrupted(format!("argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| Error::VaultCorrupted(format!("argon2: {e}")))?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key("correcthorsebatterystaple", &salt).unwrap();
        let b = derive_key("correcthorsebatterystaple", &salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sensitive_to_salt() {
        let a = derive_key("same-password", &[1u8; SALT_LEN]).unwrap();
        let b = derive_key("same-password", &[2u8; SALT_LEN]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sensitive_to_password() {
        let salt = [9u8; SALT_LEN];
        let a = derive_key("password-one", &salt).unwrap();
        let b = derive_key("password-two", &salt).unwrap();
        assert_ne!(a, b);
    }
}
