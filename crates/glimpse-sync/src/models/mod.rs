//! Data models for the sync engine

mod conflict;
mod conversation;
mod message;
mod operation;
mod status;

pub use conflict::SyncConflict;
pub use conversation::{Conversation, ConversationId};
pub use message::{Message, MessageId, Role};
pub use operation::{EntityKind, OperationId, OperationKind, OperationPayload, SyncOperation};
pub use status::SyncStatus;
