//! The closed error surface exposed to collaborators (CLI, UI, MCP server).
//!
//! Every variant corresponds to exactly one error kind in the specification.
//! Internal causes (`rusqlite`, I/O, JSON) are wrapped rather than leaked as
//! separate public kinds, so callers keep matching against this enum alone.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("vault already exists at {0}")]
    VaultExists(PathBuf),

    #[error("vault does not exist at {0}")]
    VaultAbsent(PathBuf),

    #[error("vault is locked")]
    VaultLocked,

    #[error("vault is already unlocked")]
    VaultAlreadyUnlocked,

    #[error("invalid master password")]
    InvalidPassword,

    #[error("too many failed attempts, try again in {remaining_secs}s")]
    TooManyAttempts { remaining_secs: u64 },

    #[error("unlock is in cooldown, try again in {remaining_secs}s")]
    CooldownActive { remaining_secs: u64 },

    #[error("vault is corrupted: {0}")]
    VaultCorrupted(String),

    #[error("vault metadata is corrupted: {0}")]
    MetadataCorrupted(String),

    #[error("vault database is corrupted: {0}")]
    DatabaseCorrupted(String),

    #[error("salt not found")]
    SaltNotFound,

    #[error("data encryption key not found")]
    DekNotFound,

    #[error("secret not found")]
    SecretNotFound,

    #[error("key name is invalid: {0}")]
    KeyInvalid(String),

    #[error("key name is too short (minimum 1 character)")]
    KeyTooShort,

    #[error("key name is too long (maximum 256 characters)")]
    KeyTooLong,

    #[error("value exceeds the maximum size of 1 MiB")]
    ValueTooLarge,

    #[error("notes exceed the maximum size of 10 KiB")]
    NotesTooLarge,

    #[error("url is invalid: {0}")]
    UrlInvalid(String),

    #[error("url exceeds the maximum length of 2048 characters")]
    UrlTooLong,

    #[error("too many tags (maximum 10)")]
    TooManyTags,

    #[error("tag is invalid: {0}")]
    TagInvalid(String),

    #[error("expires_at must be in the future")]
    ExpiresInPast,

    #[error("password is too short (minimum 8 characters)")]
    PasswordTooShort,

    #[error("password is too long (maximum 128 characters)")]
    PasswordTooLong,

    #[error("new password must differ from the current password")]
    SamePassword,

    #[error("folder not found")]
    FolderNotFound,

    #[error("a folder with that name already exists in this location")]
    FolderExists,

    #[error("folder has child folders")]
    FolderHasChildren,

    #[error("folder has secrets")]
    FolderHasSecrets,

    #[error("folder move would create a cycle")]
    FolderCircular,

    #[error("folder name is invalid: {0}")]
    FolderNameInvalid(String),

    #[error("insufficient disk space: need at least {needed} bytes, {available} available")]
    InsufficientDisk { needed: u64, available: u64 },

    #[error("decryption failed: authentication tag mismatch")]
    DecryptFailed,

    #[error("audit log is corrupted: {0}")]
    AuditCorrupted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
