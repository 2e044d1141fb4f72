//! Row-level CRUD against the `folders` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct FolderRow {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<FolderRow> {
    Ok(FolderRow {
        id: row.get("id")?,
        name: row.get("name")?,
        parent_id: row.get("parent_id")?,
        icon: row.get("icon")?,
        color: row.get("color")?,
        sort_order: row.get("sort_order")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const SELECT_COLUMNS: &str =
    "id, name, parent_id, icon, color, sort_order, created_at, updated_at";

pub fn insert(conn: &rusqlite::Connection, row: &FolderRow) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO folders (id, name, parent_id, icon, color, sort_order, created_at, \
         updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.id,
            row.name,
            row.parent_id,
            row.icon,
            row.color,
            row.sort_order,
            row.created_at.to_rfc3339(),
            row.updated_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::FolderExists)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn update(conn: &rusqlite::Connection, row: &FolderRow) -> Result<()> {
    let result = conn.execute(
        "UPDATE folders SET name = ?2, parent_id = ?3, icon = ?4, color = ?5, sort_order = ?6, \
         updated_at = ?7 WHERE id = ?1",
        params![
            row.id,
            row.name,
            row.parent_id,
            row.icon,
            row.color,
            row.sort_order,
            row.updated_at.to_rfc3339(),
        ],
    );

    match result {
        Ok(0) => Err(Error::FolderNotFound),
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::FolderExists)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_by_id(conn: &rusqlite::Connection, id: &str) -> Result<Option<FolderRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM folders WHERE id = ?1");
    conn.query_row(&sql, [id], from_row).optional().map_err(Into::into)
}

pub fn get_by_name_and_parent(
    conn: &rusqlite::Connection,
    name: &str,
    parent_id: Option<&str>,
) -> Result<Option<FolderRow>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM folders WHERE name = ?1 COLLATE NOCASE AND \
         ((parent_id IS NULL AND ?2 IS NULL) OR parent_id = ?2)"
    );
    conn.query_row(&sql, params![name, parent_id], from_row)
        .optional()
        .map_err(Into::into)
}

pub fn list_children(
    conn: &rusqlite::Connection,
    parent_id: Option<&str>,
) -> Result<Vec<FolderRow>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM folders WHERE \
         ((parent_id IS NULL AND ?1 IS NULL) OR parent_id = ?1) ORDER BY sort_order ASC, name ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([parent_id], from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn list_all(conn: &rusqlite::Connection) -> Result<Vec<FolderRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM folders ORDER BY sort_order ASC, name ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

pub fn delete(conn: &rusqlite::Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM folders WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

pub fn count_children(conn: &rusqlite::Connection, id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM folders WHERE parent_id = ?1",
        [id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}
