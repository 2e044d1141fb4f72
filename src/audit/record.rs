//! Audit record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    VaultInit,
    VaultUnlock,
    VaultUnlockFailed,
    VaultLock,
    PasswordChanged,
    SecretSet,
    SecretGet,
    SecretList,
    SecretDelete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::VaultInit => "vault-init",
            Operation::VaultUnlock => "vault-unlock",
            Operation::VaultUnlockFailed => "vault-unlock-failed",
            Operation::VaultLock => "vault-lock",
            Operation::PasswordChanged => "password-changed",
            Operation::SecretSet => "secret-set",
            Operation::SecretGet => "secret-get",
            Operation::SecretList => "secret-list",
            Operation::SecretDelete => "secret-delete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Denied,
    Error,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Denied => "denied",
            OutcomeKind::Error => "error",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: String,
    pub source: String,
    pub session_id: String,
}

impl Default for Actor {
    fn default() -> Self {
        Self {
            actor_type: "local".to_string(),
            source: "vaultkeep-core".to_string(),
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chain {
    pub sequence: u64,
    pub previous_hmac: String,
    pub hmac: String,
}

/// An error code carried in `context["error_code"]` for non-success results.
pub mod error_codes {
    pub const INVALID_KEY: &str = "INVALID_KEY";
    pub const DECRYPT_FAILED: &str = "DECRYPT_FAILED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const DISK_FULL: &str = "DISK_FULL";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub schema_version: u32,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub key: Option<String>,
    pub key_hash: Option<String>,
    pub actor: Actor,
    pub result: OutcomeKind,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    pub chain: Chain,
}

/// Builds a lexicographically sortable id: `<nanos-since-epoch>-<random4>`.
pub fn new_record_id(now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or(0);
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    format!("{nanos:020}-{suffix}")
}
