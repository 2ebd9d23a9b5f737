//! SQLite-backed [`PatternStore`]. Values survive process restarts.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::PatternStore;
use crate::error::StoreError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS pattern_store (
    key   TEXT PRIMARY KEY NOT NULL,
    value INTEGER NOT NULL
)";

/// Durable pattern store in a single SQLite table.
///
/// The connection is guarded by a `Mutex`; every operation is one statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(SCHEMA, [])?;
        tracing::debug!("pattern_store table ready");
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl PatternStore for SqliteStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM pattern_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO pattern_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute("DELETE FROM pattern_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_int("nothing").unwrap(), None);
    }

    #[test]
    fn test_upsert_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_int("k", 1).unwrap();
        store.set_int("k", 3).unwrap();
        assert_eq!(store.get_int("k").unwrap(), Some(3));
    }

    #[test]
    fn test_keys_are_independent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_int("a", 1).unwrap();
        store.set_int("b", 2).unwrap();
        assert_eq!(store.get_int("a").unwrap(), Some(1));
        assert_eq!(store.get_int("b").unwrap(), Some(2));
    }

    #[test]
    fn test_remove_then_get_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_int("k", 1).unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get_int("k").unwrap(), None);
        // second delete is a no-op
        store.remove("k").unwrap();
    }

    #[test]
    fn test_negative_values_preserved() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_int("k", -17).unwrap();
        assert_eq!(store.get_int("k").unwrap(), Some(-17));
    }
}
