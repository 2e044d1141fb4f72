//! Self-checks and the disk-space / lock-state diagnostics named in the
//! public contract (spec §6).

use std::fs;

use chrono::Utc;
use serde::Serialize;

use crate::diskspace;
use crate::error::{Error, Result};
use crate::paths::{self, VaultPaths};
use crate::ratelimit::{LockState, RateLimiter};
use crate::storage::{schema, Store};

use super::Vault;

#[derive(Clone, Debug, Default)]
pub struct IntegrityReport {
    pub healthy: bool,
    pub issues: Vec<String>,
}

impl Vault {
    /// File-presence, permission, JSON-well-formedness, and relational
    /// integrity checks. Never mutates.
    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        let mut issues = Vec::new();

        if !self.paths.db().exists() {
            issues.push("vault.db is missing".to_string());
        }
        if !self.paths.meta().exists() {
            issues.push("vault.meta is missing".to_string());
        } else if let Err(e) = read_meta(&self.paths) {
            issues.push(format!("vault.meta is not valid JSON: {e}"));
        }

        if paths::mode_deviates(&self.paths.root, 0o700) {
            issues.push("vault directory permissions deviate from 0700".to_string());
        }
        if paths::mode_deviates(&self.paths.db(), 0o600) {
            issues.push("vault.db permissions deviate from 0600".to_string());
        }

        if self.paths.db().exists() {
            match Store::open(&self.paths.db()) {
                Ok(store) => {
                    for table in schema::REQUIRED_TABLES {
                        match schema::table_exists(store.connection(), table) {
                            Ok(true) => {}
                            Ok(false) => issues.push(format!("missing required table '{table}'")),
                            Err(e) => issues.push(format!("could not check table '{table}': {e}")),
                        }
                    }
                    let check: rusqlite::Result<String> = store
                        .connection()
                        .query_row("PRAGMA integrity_check", [], |row| row.get(0));
                    match check {
                        Ok(result) if result == "ok" => {}
                        Ok(result) => issues.push(format!("sqlite integrity_check reported: {result}")),
                        Err(e) => issues.push(format!("sqlite integrity_check failed: {e}")),
                    }
                }
                Err(e) => issues.push(format!("could not open vault database: {e}")),
            }
        }

        Ok(IntegrityReport { healthy: issues.is_empty(), issues })
    }

    /// Reconstructs `vault.meta` from `vault_keys.created_at` when it is
    /// missing or unparseable and the store itself is otherwise healthy.
    pub fn repair(&self) -> Result<()> {
        if !self.paths.db().exists() {
            return Err(Error::VaultAbsent(self.paths.root.clone()));
        }
        if self.paths.meta().exists() && read_meta(&self.paths).is_ok() {
            return Ok(());
        }

        let store = Store::open(&self.paths.db())?;
        let created_at: String = store.connection().query_row(
            "SELECT created_at FROM vault_keys WHERE id = 1",
            [],
            |row| row.get(0),
        )?;

        #[derive(Serialize)]
        struct Meta<'a> {
            version: &'a str,
            created_at: &'a str,
        }
        let body = serde_json::to_vec_pretty(&Meta { version: "1.0.0", created_at: &created_at })?;
        let path = self.paths.meta();
        fs::write(&path, body)?;
        paths::set_mode(&path, 0o600)?;
        Ok(())
    }

    pub fn check_disk_space(&self, payload_bytes: u64) -> Option<(u64, u64)> {
        diskspace::insufficient_for(&self.paths.root, payload_bytes)
    }

    pub fn get_lock_state(&self) -> Result<LockState> {
        RateLimiter::new(&self.paths.root).load()
    }

    pub fn remaining_cooldown(&self) -> Result<Option<u64>> {
        Ok(self.get_lock_state()?.remaining_cooldown(Utc::now()))
    }
}

fn read_meta(paths: &VaultPaths) -> Result<()> {
    let body = fs::read_to_string(paths.meta())?;
    let _value: serde_json::Value = serde_json::from_str(&body)?;
    Ok(())
}
