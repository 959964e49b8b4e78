//! SqlitePersistence: SQLite-backed write-through store.
//!
//! One row per key in `cache_entries`, value column holding the raw Store bytes.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{PersistedRow, Persistence};
use crate::error::{CacheError, Result};

/// DDL for the cache mirror table.
pub const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    key   TEXT NOT NULL UNIQUE,
    value BLOB NOT NULL
);
"#;

/// SQLite-backed persistence adapter.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    /// Open a file-backed store, creating the table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_connection(conn: &Connection) -> Result<()> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CacheError::Persistence("connection mutex poisoned".to_string()))?;
        Ok(f(&conn)?)
    }
}

impl Persistence for SqlitePersistence {
    fn insert_or_update(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO cache_entries (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
                params![key, blob],
            )
        })?;
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<PersistedRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM cache_entries ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<PersistedRow>>>()?;
            Ok(rows)
        })
    }

    fn remove_by_key(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM cache_entries WHERE key = ?1", [key]))?;
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM cache_entries", []))?;
        Ok(())
    }
}
