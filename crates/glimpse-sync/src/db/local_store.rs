//! Local record store: the single source of truth for what the UI renders

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{
    Conversation, ConversationId, EntityKind, Message, MessageId, Role, SyncConflict, SyncStatus,
};

use super::Database;

/// Aggregate record counts by sync status, across both record tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub error: u64,
    pub synced: u64,
}

/// Durable CRUD over conversations and messages
///
/// Never performs network I/O. Mutated only by the UI-facing write API
/// (`LocalWriter`) and by the sync service's merge logic.
pub struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    /// Create a store over the shared database handle
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// List all conversations, most recently updated first
    pub fn get_conversations(&self) -> Result<Vec<Conversation>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, owner_id, created_at, updated_at, sync_status,
                        last_synced_at, remote_updated_at
                 FROM conversations
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map([], parse_conversation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Get a conversation by ID
    pub fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        self.db.with_conn(|conn| get_conversation(conn, id))
    }

    /// Insert or replace a conversation
    pub fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.db
            .with_conn(|conn| upsert_conversation(conn, conversation))
    }

    /// Delete a conversation and all of its messages
    ///
    /// This is the raw cascade; it does not enqueue sync operations. Use
    /// `LocalWriter::delete_conversation` for user-initiated deletes.
    pub fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        self.db.with_conn(|conn| delete_conversation(conn, id))
    }

    /// List a conversation's messages in creation order
    pub fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        self.db
            .with_conn(|conn| get_messages(conn, conversation_id))
    }

    /// Get a message by ID
    pub fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        self.db.with_conn(|conn| get_message(conn, id))
    }

    /// Insert or replace a message
    pub fn upsert_message(&self, message: &Message) -> Result<()> {
        self.db.with_conn(|conn| upsert_message(conn, message))
    }

    /// Delete a message
    pub fn delete_message(&self, id: &MessageId) -> Result<()> {
        self.db.with_conn(|conn| delete_message(conn, id))
    }

    /// Mark a record confirmed by the remote
    ///
    /// A no-op when the record no longer exists locally (e.g. confirming a
    /// pushed DELETE).
    pub fn mark_synced(&self, entity: EntityKind, entity_id: &str, now_ms: i64) -> Result<()> {
        self.db.with_conn(|conn| {
            match entity {
                EntityKind::Conversation => conn.execute(
                    "UPDATE conversations
                     SET sync_status = 'synced', last_synced_at = ?2, remote_updated_at = updated_at
                     WHERE id = ?1",
                    params![entity_id, now_ms],
                )?,
                EntityKind::Message => conn.execute(
                    "UPDATE messages SET sync_status = 'synced', last_synced_at = ?2 WHERE id = ?1",
                    params![entity_id, now_ms],
                )?,
            };
            Ok(())
        })
    }

    /// Mark a record as terminally failed
    pub fn mark_error(&self, entity: EntityKind, entity_id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            match entity {
                EntityKind::Conversation => conn.execute(
                    "UPDATE conversations SET sync_status = 'error' WHERE id = ?1",
                    params![entity_id],
                )?,
                EntityKind::Message => conn.execute(
                    "UPDATE messages SET sync_status = 'error' WHERE id = ?1",
                    params![entity_id],
                )?,
            };
            Ok(())
        })
    }

    /// Aggregate status counters for UI display
    pub fn status_counts(&self) -> Result<StatusCounts> {
        self.db.with_conn(|conn| {
            Ok(StatusCounts {
                pending: count_status(conn, SyncStatus::Pending)?,
                error: count_status(conn, SyncStatus::Error)?,
                synced: count_status(conn, SyncStatus::Synced)?,
            })
        })
    }

    /// Most recently recorded pull-phase conflicts
    pub fn recent_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entity, entity_id, local_updated_at, incoming_updated_at,
                        resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    let entity: String = row.get(1)?;
                    Ok(SyncConflict {
                        id: row.get(0)?,
                        entity: entity.parse().unwrap_or(EntityKind::Conversation),
                        entity_id: row.get(2)?,
                        local_updated_at: row.get(3)?,
                        incoming_updated_at: row.get(4)?,
                        resolved_at: row.get(5)?,
                        strategy: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn count_status(conn: &Connection, status: SyncStatus) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM conversations WHERE sync_status = ?1)
              + (SELECT COUNT(*) FROM messages WHERE sync_status = ?1)",
        params![status.as_str()],
        |row| row.get(0),
    )?;
    Ok(count.unsigned_abs())
}

/// Parse a conversation from a database row
fn parse_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;
    Ok(Conversation {
        id: id.parse().unwrap_or_default(),
        title: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        sync_status: status.parse().unwrap_or(SyncStatus::Pending),
        last_synced_at: row.get(6)?,
        remote_updated_at: row.get(7)?,
    })
}

/// Parse a message from a database row
fn parse_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    let status: String = row.get(5)?;
    Ok(Message {
        id: id.parse().unwrap_or_default(),
        conversation_id: conversation_id.parse().unwrap_or_default(),
        role: role.parse().unwrap_or(Role::User),
        content: row.get(3)?,
        created_at: row.get(4)?,
        sync_status: status.parse().unwrap_or(SyncStatus::Pending),
        last_synced_at: row.get(6)?,
    })
}

pub(crate) fn get_conversation(
    conn: &Connection,
    id: &ConversationId,
) -> Result<Option<Conversation>> {
    conn.query_row(
        "SELECT id, title, owner_id, created_at, updated_at, sync_status,
                last_synced_at, remote_updated_at
         FROM conversations WHERE id = ?",
        params![id.as_str()],
        parse_conversation,
    )
    .optional()
    .map_err(Error::from)
}

pub(crate) fn upsert_conversation(conn: &Connection, conversation: &Conversation) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO conversations
         (id, title, owner_id, created_at, updated_at, sync_status, last_synced_at, remote_updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            conversation.id.as_str(),
            conversation.title,
            conversation.owner_id,
            conversation.created_at,
            conversation.updated_at,
            conversation.sync_status.as_str(),
            conversation.last_synced_at,
            conversation.remote_updated_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_conversation(conn: &Connection, id: &ConversationId) -> Result<()> {
    conn.execute(
        "DELETE FROM messages WHERE conversation_id = ?",
        params![id.as_str()],
    )?;
    conn.execute("DELETE FROM conversations WHERE id = ?", params![id.as_str()])?;
    Ok(())
}

pub(crate) fn get_messages(
    conn: &Connection,
    conversation_id: &ConversationId,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, role, content, created_at, sync_status, last_synced_at
         FROM messages
         WHERE conversation_id = ?
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![conversation_id.as_str()], parse_message)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn get_message(conn: &Connection, id: &MessageId) -> Result<Option<Message>> {
    conn.query_row(
        "SELECT id, conversation_id, role, content, created_at, sync_status, last_synced_at
         FROM messages WHERE id = ?",
        params![id.as_str()],
        parse_message,
    )
    .optional()
    .map_err(Error::from)
}

pub(crate) fn upsert_message(conn: &Connection, message: &Message) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO messages
         (id, conversation_id, role, content, created_at, sync_status, last_synced_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            message.id.as_str(),
            message.conversation_id.as_str(),
            message.role.as_str(),
            message.content,
            message.created_at,
            message.sync_status.as_str(),
            message.last_synced_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_message(conn: &Connection, id: &MessageId) -> Result<()> {
    conn.execute("DELETE FROM messages WHERE id = ?", params![id.as_str()])?;
    Ok(())
}

pub(crate) fn record_conflict(
    conn: &Connection,
    entity: EntityKind,
    entity_id: &str,
    local_updated_at: i64,
    incoming_updated_at: i64,
    strategy: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_conflicts
         (entity, entity_id, local_updated_at, incoming_updated_at, resolved_at, strategy)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            entity.as_str(),
            entity_id,
            local_updated_at,
            incoming_updated_at,
            chrono::Utc::now().timestamp_millis(),
            strategy,
        ],
    )?;
    Ok(())
}
