//! Queued mutation operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Conversation, Message};
use crate::error::Error;

/// A unique identifier for a queued operation, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Create a new unique operation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What a queued operation does to its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!(
                "unknown operation kind: {other}"
            ))),
        }
    }
}

/// Which record table an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Conversation,
    Message,
}

impl EntityKind {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "message" => Ok(Self::Message),
            other => Err(Error::InvalidInput(format!("unknown entity kind: {other}"))),
        }
    }
}

/// Typed snapshot of the record an operation carries
///
/// The tagged union is what keeps malformed records out of the queue: an
/// operation can only be built from a fully-formed `Conversation` or
/// `Message`, and the payload column deserializes back into one or fails
/// loudly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "record", rename_all = "lowercase")]
pub enum OperationPayload {
    Conversation(Conversation),
    Message(Message),
}

impl OperationPayload {
    /// The record table this payload belongs to
    #[must_use]
    pub const fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Conversation(_) => EntityKind::Conversation,
            Self::Message(_) => EntityKind::Message,
        }
    }

    /// The target record's id
    #[must_use]
    pub fn entity_id(&self) -> String {
        match self {
            Self::Conversation(c) => c.id.as_str(),
            Self::Message(m) => m.id.as_str(),
        }
    }
}

/// A pending mutation awaiting remote confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Unique identifier
    pub id: OperationId,
    /// CREATE / UPDATE / DELETE
    pub kind: OperationKind,
    /// Snapshot of the record at enqueue time
    pub payload: OperationPayload,
    /// Enqueue timestamp (Unix ms); queue drains in this order
    pub created_at: i64,
    /// Failed push attempts so far; bounded by `SyncConfig::max_retries`
    pub retry_count: u32,
}

impl SyncOperation {
    /// Create a new operation snapshotting the given record
    #[must_use]
    pub fn new(kind: OperationKind, payload: OperationPayload) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            payload,
            created_at: chrono::Utc::now().timestamp_millis(),
            retry_count: 0,
        }
    }
}
