//! Remote backend adapters
//!
//! The sync service talks to the backend exclusively through the
//! [`RemoteStore`] trait: per-table CRUD plus a point-in-time "changed
//! since" query. The backend's realtime change-feed is consumed by UI code
//! directly and deliberately has no surface here, so the pull path never
//! double-bookkeeps pushed events.

mod http;
mod memory;
mod rows;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use http::HttpRemoteStore;
pub use memory::{InMemoryRemoteStore, RemoteCall};
pub use rows::{ConversationRow, MessageRow};

/// Result type alias for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Errors from the remote backend, classified by how the sync service
/// must react
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Expired or missing credentials; non-retriable, aborts the cycle
    /// without touching queued operations
    #[error("remote rejected credentials: {0}")]
    Auth(String),

    /// Duplicate key: the remote already has this record. Creation is
    /// idempotent by id, so callers treat this as success
    #[error("remote already has record {0}")]
    Conflict(String),

    /// Timeout, connection failure, or 5xx; worth retrying
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// Any other 4xx; retrying cannot help, the record is marked `error`
    #[error("permanent remote failure (HTTP {status}): {body}")]
    Permanent { status: u16, body: String },
}

impl RemoteError {
    /// Whether a later attempt could succeed
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level failures (timeouts, refused connections, dropped
        // sockets) are all worth retrying; anything with a status code goes
        // through `classify_status` instead.
        Self::Transient(err.to_string())
    }
}

/// Adapter over a networked backend exposing per-table CRUD and a
/// changes-since query
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_conversation(&self, row: &ConversationRow) -> RemoteResult<()>;
    async fn update_conversation(&self, id: &str, row: &ConversationRow) -> RemoteResult<()>;
    async fn delete_conversation(&self, id: &str) -> RemoteResult<()>;

    async fn create_message(&self, row: &MessageRow) -> RemoteResult<()>;
    async fn update_message(&self, id: &str, row: &MessageRow) -> RemoteResult<()>;
    async fn delete_message(&self, id: &str) -> RemoteResult<()>;

    /// Conversations whose `updated_at` is strictly after `since`
    async fn conversations_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<ConversationRow>>;

    /// Messages changed strictly after `since`; messages are append-only,
    /// so this is effectively the set created after it
    async fn messages_changed_since(&self, since: DateTime<Utc>)
        -> RemoteResult<Vec<MessageRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retriable() {
        assert!(RemoteError::Transient("timeout".into()).is_retriable());
        assert!(!RemoteError::Auth("expired".into()).is_retriable());
        assert!(!RemoteError::Conflict("c1".into()).is_retriable());
        assert!(!RemoteError::Permanent {
            status: 422,
            body: String::new()
        }
        .is_retriable());
    }
}
