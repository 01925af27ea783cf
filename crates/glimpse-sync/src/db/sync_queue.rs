//! Durable FIFO queue of mutations awaiting remote confirmation

use std::sync::Arc;

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{OperationId, SyncOperation};

use super::Database;

/// Ordered, durable log of pending sync operations
///
/// Operations drain in enqueue order so mutations to one record reach the
/// remote in the order they happened locally. Mutated only by the write
/// API's enqueue path and by the sync service.
pub struct SyncQueue {
    db: Arc<Database>,
}

impl SyncQueue {
    /// Create a queue over the shared database handle
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append an operation to the queue
    ///
    /// The write API enqueues inside the same transaction as the record
    /// write; this standalone variant exists for the service's own
    /// bookkeeping and for tests.
    pub fn enqueue(&self, op: &SyncOperation) -> Result<()> {
        self.db.with_conn(|conn| enqueue(conn, op))
    }

    /// All queued operations in enqueue order
    pub fn list_pending(&self) -> Result<Vec<SyncOperation>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, payload, created_at, retry_count
                 FROM sync_queue
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, u32>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, kind, payload, created_at, retry_count)| {
                    Ok(SyncOperation {
                        id: id
                            .parse()
                            .map_err(|_| Error::InvalidInput(format!("bad operation id: {id}")))?,
                        kind: kind.parse()?,
                        payload: serde_json::from_str(&payload)?,
                        created_at,
                        retry_count,
                    })
                })
                .collect()
        })
    }

    /// Remove an operation (confirmed, conflicted, or terminally failed)
    pub fn remove(&self, id: &OperationId) -> Result<()> {
        self.db.with_conn(|conn| remove(conn, id))
    }

    /// Record a failed attempt; returns the new retry count
    pub fn increment_retry(&self, id: &OperationId) -> Result<u32> {
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE sync_queue SET retry_count = retry_count + 1 WHERE id = ?",
                params![id.as_str()],
            )?;
            if updated == 0 {
                return Err(Error::NotFound(id.to_string()));
            }
            let count: u32 = conn.query_row(
                "SELECT retry_count FROM sync_queue WHERE id = ?",
                params![id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Number of queued operations
    pub fn len(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn enqueue(conn: &Connection, op: &SyncOperation) -> Result<()> {
    let payload = serde_json::to_string(&op.payload)?;
    conn.execute(
        "INSERT INTO sync_queue (id, kind, entity, entity_id, payload, created_at, retry_count)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            op.id.as_str(),
            op.kind.as_str(),
            op.payload.entity_kind().as_str(),
            op.payload.entity_id(),
            payload,
            op.created_at,
            op.retry_count,
        ],
    )?;
    Ok(())
}

pub(crate) fn remove(conn: &Connection, id: &OperationId) -> Result<()> {
    conn.execute("DELETE FROM sync_queue WHERE id = ?", params![id.as_str()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversation, OperationKind, OperationPayload};
    use pretty_assertions::assert_eq;

    fn setup() -> SyncQueue {
        SyncQueue::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn op_for(conversation: &Conversation, kind: OperationKind) -> SyncOperation {
        SyncOperation::new(kind, OperationPayload::Conversation(conversation.clone()))
    }

    #[test]
    fn test_enqueue_and_list_fifo() {
        let queue = setup();
        let conversation = Conversation::new("c", None);

        let mut first = op_for(&conversation, OperationKind::Create);
        let mut second = op_for(&conversation, OperationKind::Update);
        first.created_at = 100;
        second.created_at = 200;

        queue.enqueue(&second).unwrap();
        queue.enqueue(&first).unwrap();

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }

    #[test]
    fn test_same_timestamp_preserves_insert_order() {
        let queue = setup();
        let conversation = Conversation::new("c", None);

        let mut first = op_for(&conversation, OperationKind::Create);
        let mut second = op_for(&conversation, OperationKind::Update);
        first.created_at = 100;
        second.created_at = 100;

        queue.enqueue(&first).unwrap();
        queue.enqueue(&second).unwrap();

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending[0].kind, OperationKind::Create);
        assert_eq!(pending[1].kind, OperationKind::Update);
    }

    #[test]
    fn test_remove() {
        let queue = setup();
        let op = op_for(&Conversation::new("c", None), OperationKind::Create);
        queue.enqueue(&op).unwrap();
        queue.remove(&op.id).unwrap();
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_increment_retry() {
        let queue = setup();
        let op = op_for(&Conversation::new("c", None), OperationKind::Create);
        queue.enqueue(&op).unwrap();

        assert_eq!(queue.increment_retry(&op.id).unwrap(), 1);
        assert_eq!(queue.increment_retry(&op.id).unwrap(), 2);

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending[0].retry_count, 2);
    }

    #[test]
    fn test_increment_retry_missing_op() {
        let queue = setup();
        assert!(queue.increment_retry(&OperationId::new()).is_err());
    }

    #[test]
    fn test_payload_survives_roundtrip() {
        let queue = setup();
        let conversation = Conversation::new("roundtrip", Some("user-1".into()));
        let op = op_for(&conversation, OperationKind::Create);
        queue.enqueue(&op).unwrap();

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending[0], op);
    }
}
