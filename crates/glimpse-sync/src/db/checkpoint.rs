//! Pull checkpoint persistence

use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use crate::error::Result;

use super::Database;

const CHECKPOINT_KEY: &str = "pull.checkpoint_ms";

/// The timestamp bounding the next pull query
///
/// Persisted as a scalar key in `sync_meta`, outside the record tables, so
/// it survives restarts. Defaults to epoch zero, which makes the first
/// pull a full pull.
pub struct Checkpoint {
    db: Arc<Database>,
}

impl Checkpoint {
    /// Create a checkpoint accessor over the shared database handle
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The last completed pull boundary (Unix ms)
    pub fn get(&self) -> Result<i64> {
        self.db.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM sync_meta WHERE key = ?",
                    params![CHECKPOINT_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
        })
    }

    /// Advance the pull boundary (Unix ms)
    pub fn set(&self, timestamp_ms: i64) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
                params![CHECKPOINT_KEY, timestamp_ms.to_string()],
            )?;
            Ok(())
        })
    }
}
