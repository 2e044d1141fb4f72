//! On-disk layout and permission enforcement.
//!
//! ```text
//! <vault>/
//!   vault.db        (0600, relational store)
//!   vault.salt      (0600, legacy sidecar; migrated into vault_keys.salt)
//!   vault.meta      (0600, JSON: {"version":"1.0.0","created_at":"RFC3339"})
//!   vault.lock      (0600, JSON rate-limiter state)
//!   audit/          (0700)
//!     audit.meta    (0600, JSON chain-state)
//!     YYYY-MM.jsonl (0600, one record per line)
//!   <vault>.db.backup-<unix-seconds>  (0600, created by change-password)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DB_FILENAME: &str = "vault.db";
pub const SALT_FILENAME: &str = "vault.salt";
pub const META_FILENAME: &str = "vault.meta";
pub const LOCK_FILENAME: &str = "vault.lock";
pub const AUDIT_DIRNAME: &str = "audit";
pub const AUDIT_META_FILENAME: &str = "audit.meta";

#[derive(Clone, Debug)]
pub struct VaultPaths {
    pub root: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn db(&self) -> PathBuf {
        self.root.join(DB_FILENAME)
    }

    pub fn legacy_salt(&self) -> PathBuf {
        self.root.join(SALT_FILENAME)
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join(META_FILENAME)
    }

    pub fn lock_state(&self) -> PathBuf {
        self.root.join(LOCK_FILENAME)
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join(AUDIT_DIRNAME)
    }

    pub fn audit_meta(&self) -> PathBuf {
        self.audit_dir().join(AUDIT_META_FILENAME)
    }

    pub fn audit_month_file(&self, year: i32, month: u32) -> PathBuf {
        self.audit_dir().join(format!("{year:04}-{month:02}.jsonl"))
    }

    pub fn db_backup(&self, unix_seconds: i64) -> PathBuf {
        let db = self.db();
        let mut name = db
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".backup-{unix_seconds}"));
        self.root.join(name)
    }

    /// True if any vault file exists at this root.
    pub fn exists(&self) -> bool {
        self.db().exists() || self.meta().exists()
    }
}

/// Creates a directory at the given absolute permission mode (0700 on Unix;
/// best-effort no-op for the mode on non-Unix platforms).
pub fn create_dir_with_mode(path: &Path, mode: u32) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    set_mode(path, mode)?;
    Ok(())
}

/// Sets the permission mode of an existing path (Unix only; no-op elsewhere).
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(mode);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// Creates an empty file at `path` with mode 0600 *before* any other process
/// (including the relational driver) can open it, closing the window where
/// the default umask would grant broader access. A subsequent `set_mode`
/// enforces the mode defensively in case the initial open used a looser one.
pub fn create_file_with_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(path)?;
    }
    #[cfg(not(unix))]
    {
        fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    }
    set_mode(path, mode)?;
    Ok(())
}

/// Returns `true` if `path`'s mode does not exactly match `expected` (Unix
/// only; always `false` — i.e. "no deviation detected" — elsewhere since the
/// mode cannot be inspected).
pub fn mode_deviates(path: &Path, expected: u32) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match fs::metadata(path) {
            Ok(meta) => (meta.permissions().mode() & 0o777) != expected,
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, expected);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_matches_spec() {
        let dir = tempdir().unwrap();
        let paths = VaultPaths::new(dir.path());
        assert_eq!(paths.db().file_name().unwrap(), "vault.db");
        assert_eq!(paths.meta().file_name().unwrap(), "vault.meta");
        assert_eq!(paths.lock_state().file_name().unwrap(), "vault.lock");
        assert_eq!(paths.audit_meta().file_name().unwrap(), "audit.meta");
        assert_eq!(paths.audit_month_file(2026, 7).file_name().unwrap(), "2026-07.jsonl");
    }

    #[cfg(unix)]
    #[test]
    fn create_file_with_mode_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let file = dir.path().join("secret.db");
        create_file_with_mode(&file, 0o600).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn mode_deviation_detected() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let file = dir.path().join("loose.db");
        create_file_with_mode(&file, 0o644).unwrap();
        assert!(mode_deviates(&file, 0o600));
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(!mode_deviates(&file, 0o600));
    }
}
