//! vaultkeep-core - the local-first secrets-manager engine.
//!
//! This crate provides the core functionality for a password/secrets vault:
//!
//! - [`vault`] - lifecycle state machine, record CRUD, folder graph, diagnostics
//! - [`crypto`] - Argon2id key derivation, AES-256-GCM sealed blobs, HMAC/HKDF
//! - [`storage`] - the relational store (schema, secrets, folders)
//! - [`audit`] - the tamper-evident HMAC-chained audit log
//! - [`ratelimit`] - failed-unlock cooldown schedule
//! - [`diskspace`] - free-space guard consulted before every write
//! - [`paths`] - on-disk layout and permission enforcement
//!
//! # Architecture
//!
//! ```text
//! Caller (CLI / UI / MCP server)
//!     │
//!     ▼
//! vault::Vault ─── lifecycle, records, folders, diagnostics, audit_ops
//!     │
//!     ├── crypto ──── key hierarchy, sealed blobs
//!     ├── storage ─── relational store (SQLite)
//!     ├── audit ───── HMAC-chained log
//!     ├── ratelimit ── cooldown schedule
//!     └── diskspace ── free-space guard
//! ```
//!
//! # Security
//!
//! - **Argon2id** key derivation (64 MiB memory, 3 iterations, parallelism 4)
//! - **AES-256-GCM** authenticated encryption for every stored column
//! - **Zeroize** for secure memory cleanup of keys
//! - **HMAC-chained audit log**, tamper-evident across process restarts
//! - **Rate limiting** with an escalating cooldown on failed unlocks

pub mod audit;
pub mod crypto;
pub mod diskspace;
pub mod error;
pub mod paths;
pub mod ratelimit;
pub mod storage;
pub mod vault;

pub use audit::record::{AuditRecord, Operation, OutcomeKind};
pub use audit::{Appended, BreakPoint, ExportFormat, PruneSummary, VerifyReport};
pub use error::{Error, Result};
pub use ratelimit::LockState;
pub use vault::diagnostics::IntegrityReport;
pub use vault::{
    Bindings, Field, Fields, FolderInfo, FolderStats, Metadata, NewSecret, PasswordStrength,
    SecretEntry, SecretSummary, Vault, VaultConfig,
};
