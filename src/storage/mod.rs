//! The relational storage layer: a single exclusive SQLite connection, a
//! fixed schema, and idempotent migrations (spec §4.2).

pub mod folders;
pub mod schema;
pub mod secrets;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;
use crate::paths;

/// The vault's single open connection, held for the lifetime of an unlocked
/// session. Foreign keys are enforced; busy-timeout guards against
/// cross-process contention for the exclusive lock the store backend holds.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Creates a brand-new store file at mode 0600, then creates the schema
    /// and runs migrations to the current version.
    pub fn create(path: &Path) -> Result<Self> {
        paths::create_file_with_mode(path, 0o600)?;
        let conn = open_connection(path)?;
        schema::create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Opens an existing store file and runs any pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_reopen_runs_migrations_idempotently() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("vault.db");

        {
            let _store = Store::create(&db_path).unwrap();
        }
        {
            let store = Store::open(&db_path).unwrap();
            let version: i64 = store
                .connection()
                .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
                .unwrap();
            assert_eq!(version, schema::CURRENT_SCHEMA_VERSION);
        }
        // Reopening again must not error or duplicate the migration.
        let store = Store::open(&db_path).unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
