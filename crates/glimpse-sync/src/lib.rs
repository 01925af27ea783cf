//! glimpse-sync - Local-first synchronization engine for Glimpse
//!
//! Keeps the on-device store of conversations and messages consistent with
//! the remote backend under intermittent connectivity. Local writes always
//! succeed immediately and never wait on the network; a durable operation
//! queue, a connectivity monitor, and a background sync service take care
//! of pushing local changes out and merging remote changes back in.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod writer;

pub use config::SyncConfig;
pub use db::{Checkpoint, Database, LocalStore, StatusCounts, SyncQueue};
pub use error::{Error, Result};
pub use models::{
    Conversation, ConversationId, Message, MessageId, Role, SyncOperation, SyncStatus,
};
pub use network::{NetworkMonitor, NetworkState};
pub use remote::{HttpRemoteStore, InMemoryRemoteStore, RemoteError, RemoteStore};
pub use service::{SyncService, SyncStats};
pub use writer::LocalWriter;
