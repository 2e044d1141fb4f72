//! Fixed schema and idempotent migrations.

use chrono::Utc;
use rusqlite::Connection;

use crate::error::Result;

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const CREATE_VAULT_KEYS: &str = "
CREATE TABLE IF NOT EXISTS vault_keys (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    salt BLOB NOT NULL,
    encrypted_dek BLOB NOT NULL,
    dek_nonce BLOB NOT NULL,
    created_at TEXT NOT NULL
)";

const CREATE_FOLDERS: &str = "
CREATE TABLE IF NOT EXISTS folders (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (name NOT LIKE '%/%'),
    parent_id TEXT REFERENCES folders(id) ON DELETE RESTRICT,
    icon TEXT,
    color TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const CREATE_FOLDERS_UNIQUE_NESTED: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS idx_folders_unique_nested
    ON folders (name COLLATE NOCASE, parent_id)
    WHERE parent_id IS NOT NULL";

const CREATE_FOLDERS_UNIQUE_ROOT: &str = "
CREATE UNIQUE INDEX IF NOT EXISTS idx_folders_unique_root
    ON folders (name COLLATE NOCASE)
    WHERE parent_id IS NULL";

const CREATE_SECRETS: &str = "
CREATE TABLE IF NOT EXISTS secrets (
    id TEXT PRIMARY KEY,
    key_hash TEXT NOT NULL UNIQUE,
    encrypted_key BLOB NOT NULL,
    encrypted_value BLOB,
    encrypted_fields BLOB,
    encrypted_bindings BLOB,
    encrypted_metadata BLOB,
    schema TEXT NOT NULL DEFAULT 'v1',
    field_count INTEGER NOT NULL DEFAULT 0,
    folder_id TEXT REFERENCES folders(id) ON DELETE RESTRICT,
    tags TEXT NOT NULL DEFAULT '[]',
    expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const CREATE_SECRETS_FOLDER_IDX: &str = "
CREATE INDEX IF NOT EXISTS idx_secrets_folder_id ON secrets (folder_id)";

const CREATE_SCHEMA_VERSION: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    migrated_at TEXT NOT NULL
)";

/// Creates the full fixed schema on a brand-new store.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_VAULT_KEYS)?;
    conn.execute_batch(CREATE_FOLDERS)?;
    conn.execute_batch(CREATE_FOLDERS_UNIQUE_NESTED)?;
    conn.execute_batch(CREATE_FOLDERS_UNIQUE_ROOT)?;
    conn.execute_batch(CREATE_SECRETS)?;
    conn.execute_batch(CREATE_SECRETS_FOLDER_IDX)?;
    conn.execute_batch(CREATE_SCHEMA_VERSION)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, migrated_at) VALUES (?1, ?2)",
        rusqlite::params![CURRENT_SCHEMA_VERSION, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Runs the idempotent migration pass at unlock time. Re-creates any table
/// or index missing from an older vault (via `IF NOT EXISTS`), then records
/// the current schema version if absent.
pub fn migrate(conn: &Connection) -> Result<()> {
    create_schema(conn)
}

/// Required tables for [`crate::vault::diagnostics::check_integrity`].
pub const REQUIRED_TABLES: &[&str] = &["vault_keys", "folders", "secrets", "schema_version"];

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_required_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        for table in REQUIRED_TABLES {
            assert!(table_exists(&conn, table).unwrap(), "missing table {table}");
        }
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
