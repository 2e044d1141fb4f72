//! The vault core: lifecycle state machine, key hierarchy, record CRUD,
//! folder graph, and diagnostics (spec §4.3). Everything a collaborator
//! (CLI, UI, MCP server) touches routes through [`Vault`].

pub mod diagnostics;
pub mod fields;
pub mod folders;
pub mod lifecycle;
pub mod records;
pub mod validation;

mod audit_ops;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use std::collections::BTreeMap;

use crate::audit::{record::Operation, AuditLog, OutcomeKind};
use crate::crypto;
use crate::error::{Error, Result};
use crate::paths::VaultPaths;
use crate::storage::Store;

pub use fields::{Bindings, Field, Fields, Metadata};
pub use folders::{FolderInfo, FolderStats};
pub use records::{NewSecret, SecretEntry, SecretSummary};
pub use validation::PasswordStrength;

/// Everything that only exists while the vault is unlocked. Dropping this
/// zeroizes the data-encryption key.
pub(crate) struct UnlockedState {
    pub(crate) dek: [u8; 32],
    pub(crate) store: Store,
    pub(crate) audit: AuditLog,
}

impl Drop for UnlockedState {
    fn drop(&mut self) {
        crypto::wipe(&mut self.dek);
    }
}

/// A single vault identified by its directory. Safe to share across
/// threads: mutating operations take the lock exclusively, reads take it
/// shared, matching the single-writer discipline of the relational store
/// underneath.
pub struct Vault {
    pub(crate) paths: VaultPaths,
    pub(crate) state: RwLock<Option<UnlockedState>>,
    /// The audit HMAC key from the most recent successful `init`/`unlock`
    /// in this process, retained across a subsequent `lock` so that a
    /// later failed unlock attempt can still be appended to the chain
    /// without needing the DEK (see `log_locked_event`).
    pub(crate) last_audit_key: Mutex<Option<[u8; 32]>>,
}

/// Where a vault lives. The only piece of external configuration the core
/// takes from its caller — everything else (KDF cost, cooldown schedule,
/// size limits) is a fixed constant per the on-disk format.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub root: PathBuf,
}

impl VaultConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: VaultPaths::new(root),
            state: RwLock::new(None),
            last_audit_key: Mutex::new(None),
        }
    }

    pub fn from_config(config: VaultConfig) -> Self {
        Self::new(config.root)
    }

    pub fn path(&self) -> &Path {
        &self.paths.root
    }

    pub fn is_locked(&self) -> bool {
        self.state.read().expect("vault lock poisoned").is_none()
    }

    pub(crate) fn with_unlocked<R>(&self, f: impl FnOnce(&UnlockedState) -> Result<R>) -> Result<R> {
        let guard = self.state.read().expect("vault lock poisoned");
        let unlocked = guard.as_ref().ok_or(Error::VaultLocked)?;
        f(unlocked)
    }

    pub(crate) fn with_unlocked_mut<R>(
        &self,
        f: impl FnOnce(&mut UnlockedState) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.state.write().expect("vault lock poisoned");
        let unlocked = guard.as_mut().ok_or(Error::VaultLocked)?;
        f(unlocked)
    }

    /// Best-effort audit append: failures are warned, never propagated
    /// (spec §4.4's "best-effort discipline").
    pub(crate) fn log_event(
        &self,
        audit: &AuditLog,
        operation: Operation,
        key: Option<String>,
        key_hash: Option<String>,
        result: OutcomeKind,
        context: BTreeMap<String, String>,
    ) {
        if let Err(e) = audit.append(operation, key, key_hash, result, context, chrono::Utc::now()) {
            tracing::warn!(error = %e, operation = operation.as_str(), "audit log append failed");
        }
    }

    /// Logs an event while the vault has no open `UnlockedState` (used
    /// only for `vault-unlock-failed`), reusing the last process-cached
    /// audit key. If no key has ever been cached in this process, the
    /// event is dropped with a warning rather than blocking the unlock
    /// path on a key we cannot obtain without the very password that just
    /// failed.
    pub(crate) fn log_locked_event(
        &self,
        operation: Operation,
        result: OutcomeKind,
        context: BTreeMap<String, String>,
    ) {
        let cached = *self.last_audit_key.lock().expect("audit key lock poisoned");
        let Some(key) = cached else {
            tracing::warn!(
                operation = operation.as_str(),
                "no cached audit key yet in this process; skipping audit entry for a locked-state event"
            );
            return;
        };
        match AuditLog::open(self.paths.clone(), key) {
            Ok(audit) => self.log_event(&audit, operation, None, None, result, context),
            Err(e) => tracing::warn!(error = %e, "could not open audit log for a locked-state event"),
        }
    }
}
