//! Database connection management

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::Connection;

use crate::error::Result;

use super::migrations;

/// SQLite database wrapper shared by the engine's stores
///
/// The connection is guarded by a mutex so the write API and the sync
/// service can share one handle; every access is a short transaction, so
/// contention is negligible.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let database = Self {
            conn: Mutex::new(conn),
        };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure SQLite for a local-first workload
    fn configure(&self) -> Result<()> {
        self.with_conn(|conn| {
            // WAL keeps UI reads from blocking behind sync-service writes.
            conn.pragma_update(None, "journal_mode", "wal").ok();
            conn.pragma_update(None, "synchronous", "NORMAL").ok();
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        self.with_conn(migrations::run)
    }

    /// Run a closure with exclusive access to the connection
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let tables: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'conversations'",
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(tables, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_open_on_disk_enables_wal() {
        let tmp = tempdir().unwrap();
        let db = Database::open(tmp.path().join("glimpse.db")).unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .unwrap();
            assert_eq!(mode.to_lowercase(), "wal");
            Ok(())
        })
        .unwrap();
    }
}
