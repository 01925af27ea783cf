//! Wire representation of remote table rows
//!
//! Field names are the backend's snake_case columns; timestamps cross the
//! wire as RFC 3339 and live locally as Unix milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Conversation, Message, SyncStatus};

/// A row in the remote `conversations` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in the remote `messages` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

fn to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

impl From<&Conversation> for ConversationRow {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.as_str(),
            user_id: conversation.owner_id.clone(),
            title: conversation.title.clone(),
            created_at: to_datetime(conversation.created_at),
            updated_at: to_datetime(conversation.updated_at),
        }
    }
}

impl From<&Message> for MessageRow {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.as_str(),
            conversation_id: message.conversation_id.as_str(),
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            created_at: to_datetime(message.created_at),
        }
    }
}

impl ConversationRow {
    /// Build the local record a pull inserts or merges, marked `synced`
    pub(crate) fn try_to_local(&self, now_ms: i64) -> Result<Conversation> {
        let updated_ms = self.updated_at.timestamp_millis();
        Ok(Conversation {
            id: self
                .id
                .parse()
                .map_err(|_| Error::InvalidInput(format!("bad conversation id: {}", self.id)))?,
            title: self.title.clone(),
            owner_id: self.user_id.clone(),
            created_at: self.created_at.timestamp_millis(),
            updated_at: updated_ms,
            sync_status: SyncStatus::Synced,
            last_synced_at: Some(now_ms),
            remote_updated_at: Some(updated_ms),
        })
    }
}

impl MessageRow {
    /// Build the local record a pull inserts, marked `synced`
    pub(crate) fn try_to_local(&self, now_ms: i64) -> Result<Message> {
        Ok(Message {
            id: self
                .id
                .parse()
                .map_err(|_| Error::InvalidInput(format!("bad message id: {}", self.id)))?,
            conversation_id: self.conversation_id.parse().map_err(|_| {
                Error::InvalidInput(format!("bad conversation id: {}", self.conversation_id))
            })?,
            role: self.role.parse()?,
            content: self.content.clone(),
            created_at: self.created_at.timestamp_millis(),
            sync_status: SyncStatus::Synced,
            last_synced_at: Some(now_ms),
        })
    }
}
