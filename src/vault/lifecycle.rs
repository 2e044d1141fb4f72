//! `init` / `unlock` / `lock` / `change-password` (spec §4.3).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::audit::record::{self, Operation};
use crate::audit::{AuditLog, OutcomeKind};
use crate::crypto;
use crate::error::{Error, Result};
use crate::paths::{self, VaultPaths};
use crate::ratelimit::RateLimiter;
use crate::storage::Store;

use super::validation;
use super::{UnlockedState, Vault};

/// `init` refuses to proceed with less than this much free space on the
/// filesystem that will hold the vault directory.
const INIT_MIN_FREE_BYTES: u64 = 1024 * 1024;

impl Vault {
    /// Creates a brand-new vault at this path. Leaves the vault `locked`
    /// afterwards — callers that want to keep working call `unlock`.
    pub fn init(&self, password: &str) -> Result<()> {
        if self.paths.exists() {
            return Err(Error::VaultExists(self.paths.root.clone()));
        }
        validation::validate_password_len(password)?;

        let parent = self.paths.root.parent().unwrap_or_else(|| Path::new("."));
        if let Some(available) = crate::diskspace::available_bytes(parent) {
            if available < INIT_MIN_FREE_BYTES {
                return Err(Error::InsufficientDisk {
                    needed: INIT_MIN_FREE_BYTES,
                    available,
                });
            }
        }

        paths::create_dir_with_mode(&self.paths.root, 0o700)?;

        let salt = crypto::random_bytes::<16>();
        let mut kek = crypto::derive_key(password, &salt)?;
        let mut dek = crypto::random_bytes::<32>();
        let sealed_dek = crypto::seal(&kek, &dek)?;
        crypto::wipe(&mut kek);

        let store = Store::create(&self.paths.db())?;
        let now = Utc::now();
        store.connection().execute(
            "INSERT INTO vault_keys (id, salt, encrypted_dek, dek_nonce, created_at) \
             VALUES (1, ?1, ?2, ?3, ?4)",
            rusqlite::params![
                salt.to_vec(),
                sealed_dek,
                sealed_dek[..crypto::aead::NONCE_LEN].to_vec(),
                now.to_rfc3339(),
            ],
        )?;

        write_meta_sidecar(&self.paths, now)?;

        let audit_key = crypto::hash::derive_audit_key(&dek)?;
        let audit = AuditLog::open(self.paths.clone(), audit_key)?;
        self.log_event(&audit, Operation::VaultInit, None, None, OutcomeKind::Success, BTreeMap::new());
        *self.last_audit_key.lock().expect("audit key lock poisoned") = Some(audit_key);

        crypto::wipe(&mut dek);
        Ok(())
    }

    /// Unlocks an existing vault. Consults the rate-limiter before
    /// attempting key derivation; records and logs a failure on a wrong
    /// password, applying the cooldown schedule.
    pub fn unlock(&self, password: &str) -> Result<()> {
        if !self.paths.exists() {
            return Err(Error::VaultAbsent(self.paths.root.clone()));
        }

        let mut guard = self.state.write().expect("vault lock poisoned");
        if guard.is_some() {
            return Err(Error::VaultAlreadyUnlocked);
        }

        let limiter = RateLimiter::new(&self.paths.root);
        let now = Utc::now();
        let lock_state = limiter.load()?;
        if let Some(remaining) = lock_state.remaining_cooldown(now) {
            return Err(Error::CooldownActive { remaining_secs: remaining });
        }

        let store = Store::open(&self.paths.db())?;
        migrate_legacy_salt(&store, &self.paths)?;

        let (salt, sealed_dek): (Vec<u8>, Vec<u8>) = store
            .connection()
            .query_row(
                "SELECT salt, encrypted_dek FROM vault_keys WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| Error::SaltNotFound)?;

        if salt.len() != 16 {
            return Err(Error::MetadataCorrupted("vault_keys.salt length".to_string()));
        }
        let mut salt_arr = [0u8; 16];
        salt_arr.copy_from_slice(&salt);

        let mut kek = crypto::derive_key(password, &salt_arr)?;
        let opened = crypto::open(&kek, &sealed_dek);
        crypto::wipe(&mut kek);

        let dek = match opened {
            Ok(bytes) if bytes.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                arr
            }
            _ => {
                let state = limiter.record_failure(now)?;
                let mut context = BTreeMap::new();
                context.insert(
                    "error_code".to_string(),
                    record::error_codes::AUTH_FAILED.to_string(),
                );
                self.log_locked_event(Operation::VaultUnlockFailed, OutcomeKind::Denied, context);
                return if let Some(remaining) = state.remaining_cooldown(now) {
                    Err(Error::TooManyAttempts { remaining_secs: remaining })
                } else {
                    Err(Error::InvalidPassword)
                };
            }
        };

        warn_on_permission_drift(&self.paths);

        let audit_key = crypto::hash::derive_audit_key(&dek)?;
        let audit = AuditLog::open(self.paths.clone(), audit_key)?;
        limiter.clear()?;

        self.log_event(&audit, Operation::VaultUnlock, None, None, OutcomeKind::Success, BTreeMap::new());
        *self.last_audit_key.lock().expect("audit key lock poisoned") = Some(audit_key);

        *guard = Some(UnlockedState { dek, store, audit });
        Ok(())
    }

    /// Locks the vault: logs `vault-lock` if it was unlocked, then drops
    /// the unlocked state, zeroizing the DEK.
    pub fn lock(&self) -> Result<()> {
        let mut guard = self.state.write().expect("vault lock poisoned");
        if let Some(unlocked) = guard.take() {
            self.log_event(&unlocked.audit, Operation::VaultLock, None, None, OutcomeKind::Success, BTreeMap::new());
        }
        Ok(())
    }

    /// Atomically rewraps the DEK under a new password. The DEK itself
    /// never changes, so every existing secret remains readable.
    pub fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let mut guard = self.state.write().expect("vault lock poisoned");
        let unlocked = guard.as_mut().ok_or(Error::VaultLocked)?;

        if current == new {
            return Err(Error::SamePassword);
        }
        validation::validate_password_len(new)?;

        let backup_path = self.paths.db_backup(Utc::now().timestamp());
        fs::copy(self.paths.db(), &backup_path)?;
        paths::set_mode(&backup_path, 0o600)?;

        let (old_salt, old_sealed_dek): (Vec<u8>, Vec<u8>) = unlocked
            .store
            .connection()
            .query_row(
                "SELECT salt, encrypted_dek FROM vault_keys WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
        if old_salt.len() != 16 {
            return Err(Error::MetadataCorrupted("vault_keys.salt length".to_string()));
        }
        let mut old_salt_arr = [0u8; 16];
        old_salt_arr.copy_from_slice(&old_salt);

        let mut old_kek = crypto::derive_key(current, &old_salt_arr)?;
        let reopened = crypto::open(&old_kek, &old_sealed_dek);
        crypto::wipe(&mut old_kek);

        let mut dek_copy = match reopened {
            Ok(bytes) if bytes.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                arr
            }
            _ => return Err(Error::InvalidPassword),
        };

        let new_salt = crypto::random_bytes::<16>();
        let mut new_kek = crypto::derive_key(new, &new_salt)?;
        let new_sealed_dek = crypto::seal(&new_kek, &dek_copy)?;

        let verification = crypto::open(&new_kek, &new_sealed_dek);
        crypto::wipe(&mut new_kek);
        let verified = verification.map(|plain| plain == dek_copy.to_vec()).unwrap_or(false);
        if !verified {
            crypto::wipe(&mut dek_copy);
            return Err(Error::VaultCorrupted("reseal verification failed".to_string()));
        }

        {
            let tx = unlocked.store.connection_mut().transaction()?;
            tx.execute(
                "UPDATE vault_keys SET salt = ?1, encrypted_dek = ?2, dek_nonce = ?3 WHERE id = 1",
                rusqlite::params![
                    new_salt.to_vec(),
                    new_sealed_dek.clone(),
                    new_sealed_dek[..crypto::aead::NONCE_LEN].to_vec(),
                ],
            )?;
            tx.commit()?;
        }

        crypto::wipe(&mut dek_copy);

        self.log_event(
            &unlocked.audit,
            Operation::PasswordChanged,
            None,
            None,
            OutcomeKind::Success,
            BTreeMap::new(),
        );
        Ok(())
    }
}

fn write_meta_sidecar(paths: &VaultPaths, now: chrono::DateTime<Utc>) -> Result<()> {
    #[derive(Serialize)]
    struct Meta<'a> {
        version: &'a str,
        created_at: String,
    }
    let body = serde_json::to_vec_pretty(&Meta { version: "1.0.0", created_at: now.to_rfc3339() })?;
    let path = paths.meta();
    paths::create_file_with_mode(&path, 0o600)?;
    fs::write(&path, body)?;
    Ok(())
}

/// Moves a pre-migration sidecar salt into `vault_keys.salt` if the row's
/// own salt column isn't already populated with a full 16-byte value.
fn migrate_legacy_salt(store: &Store, paths: &VaultPaths) -> Result<()> {
    let legacy = paths.legacy_salt();
    if !legacy.exists() {
        return Ok(());
    }
    let current: Vec<u8> = store
        .connection()
        .query_row("SELECT salt FROM vault_keys WHERE id = 1", [], |row| row.get(0))
        .unwrap_or_default();
    if current.len() == 16 {
        return Ok(());
    }
    let bytes = fs::read(&legacy)?;
    if bytes.len() != 16 {
        return Ok(());
    }
    store.connection().execute(
        "UPDATE vault_keys SET salt = ?1 WHERE id = 1",
        rusqlite::params![bytes],
    )?;
    Ok(())
}

fn warn_on_permission_drift(paths: &VaultPaths) {
    if paths::mode_deviates(&paths.root, 0o700) {
        tracing::warn!(path = %paths.root.display(), "vault directory permissions deviate from 0700");
    }
    if paths::mode_deviates(&paths.db(), 0o600) {
        tracing::warn!(path = %paths.db().display(), "vault database permissions deviate from 0600");
    }
}
