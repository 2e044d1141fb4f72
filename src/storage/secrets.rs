//! Row-level CRUD against the `secrets` table. This module knows nothing
//! about encryption — callers hand it already-sealed blobs and plaintext
//! metadata columns; the vault layer owns the crypto.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::Result;

#[derive(Clone, Debug)]
pub struct SecretRow {
    pub id: String,
    pub key_hash: String,
    pub encrypted_key: Vec<u8>,
    pub encrypted_value: Option<Vec<u8>>,
    pub encrypted_fields: Option<Vec<u8>>,
    pub encrypted_bindings: Option<Vec<u8>>,
    pub encrypted_metadata: Option<Vec<u8>>,
    pub schema: String,
    pub field_count: i64,
    pub folder_id: Option<String>,
    pub tags: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<SecretRow> {
    Ok(SecretRow {
        id: row.get("id")?,
        key_hash: row.get("key_hash")?,
        encrypted_key: row.get("encrypted_key")?,
        encrypted_value: row.get("encrypted_value")?,
        encrypted_fields: row.get("encrypted_fields")?,
        encrypted_bindings: row.get("encrypted_bindings")?,
        encrypted_metadata: row.get("encrypted_metadata")?,
        schema: row.get("schema")?,
        field_count: row.get("field_count")?,
        folder_id: row.get("folder_id")?,
        tags: row.get("tags")?,
        expires_at: parse_ts_opt(row.get("expires_at")?),
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

const SELECT_COLUMNS: &str = "id, key_hash, encrypted_key, encrypted_value, encrypted_fields, \
     encrypted_bindings, encrypted_metadata, schema, field_count, folder_id, tags, expires_at, \
     created_at, updated_at";

/// Inserts a new row, or updates the existing row sharing `key_hash`
/// (upsert semantics), preserving `created_at` on update and refreshing
/// `updated_at`. Returns the row's id.
pub fn upsert(conn: &rusqlite::Connection, row: &SecretRow) -> Result<String> {
    let existing_id: Option<String> = conn
        .query_row(
            "SELECT id FROM secrets WHERE key_hash = ?1",
            [&row.key_hash],
            |r| r.get(0),
        )
        .optional()?;

    let id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let created_at = if existing_id.is_some() {
        // Preserve the prior created_at: read it back before overwriting.
        conn.query_row(
            "SELECT created_at FROM secrets WHERE key_hash = ?1",
            [&row.key_hash],
            |r| r.get::<_, String>(0),
        )?
    } else {
        row.created_at.to_rfc3339()
    };

    conn.execute(
        "INSERT INTO secrets (id, key_hash, encrypted_key, encrypted_value, encrypted_fields, \
         encrypted_bindings, encrypted_metadata, schema, field_count, folder_id, tags, \
         expires_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
         ON CONFLICT(key_hash) DO UPDATE SET \
         encrypted_key = excluded.encrypted_key, \
         encrypted_value = excluded.encrypted_value, \
         encrypted_fields = excluded.encrypted_fields, \
         encrypted_bindings = excluded.encrypted_bindings, \
         encrypted_metadata = excluded.encrypted_metadata, \
         schema = excluded.schema, \
         field_count = excluded.field_count, \
         folder_id = excluded.folder_id, \
         tags = excluded.tags, \
         expires_at = excluded.expires_at, \
         updated_at = excluded.updated_at",
        params![
            id,
            row.key_hash,
            row.encrypted_key,
            row.encrypted_value,
            row.encrypted_fields,
            row.encrypted_bindings,
            row.encrypted_metadata,
            row.schema,
            row.field_count,
            row.folder_id,
            row.tags,
            row.expires_at.map(|t| t.to_rfc3339()),
            created_at,
            row.updated_at.to_rfc3339(),
        ],
    )?;

    Ok(id)
}

pub fn get_by_hash(conn: &rusqlite::Connection, key_hash: &str) -> Result<Option<SecretRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM secrets WHERE key_hash = ?1");
    conn.query_row(&sql, [key_hash], from_row)
        .optional()
        .map_err(Into::into)
}

pub fn delete_by_hash(conn: &rusqlite::Connection, key_hash: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM secrets WHERE key_hash = ?1", [key_hash])?;
    Ok(affected > 0)
}

pub fn list_all(conn: &rusqlite::Connection) -> Result<Vec<SecretRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM secrets ORDER BY created_at ASC, rowid ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn list_by_tag_like(conn: &rusqlite::Connection, tag: &str) -> Result<Vec<SecretRow>> {
    let pattern = format!("%\"{tag}\"%");
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM secrets WHERE tags LIKE ?1 ORDER BY created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([pattern], from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn list_expiring_before(
    conn: &rusqlite::Connection,
    deadline: DateTime<Utc>,
) -> Result<Vec<SecretRow>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM secrets WHERE expires_at IS NOT NULL AND expires_at <= ?1 \
         ORDER BY expires_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([deadline.to_rfc3339()], from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Clears `folder_id` on every secret referencing `folder_id` (used by
/// recursive folder delete's re-parent-to-unfiled policy).
pub fn clear_folder_id(conn: &rusqlite::Connection, folder_id: &str) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE secrets SET folder_id = NULL WHERE folder_id = ?1",
        [folder_id],
    )?;
    Ok(affected)
}

pub fn count_in_folder(conn: &rusqlite::Connection, folder_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM secrets WHERE folder_id = ?1",
        [folder_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}
