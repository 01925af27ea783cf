//! In-memory remote store for tests and offline development

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ConversationRow, MessageRow, RemoteError, RemoteResult, RemoteStore};

/// One observed remote call, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateConversation(String),
    UpdateConversation(String),
    DeleteConversation(String),
    CreateMessage(String),
    UpdateMessage(String),
    DeleteMessage(String),
    ListConversations,
    ListMessages,
}

/// Backend stand-in holding its tables in memory
///
/// Duplicate-id creates fail with `Conflict`, mirroring the backend's
/// duplicate-key behavior. Every call is recorded for ordering assertions,
/// and scripted failures can be queued to exercise the retry paths.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    conversations: Mutex<BTreeMap<String, ConversationRow>>,
    messages: Mutex<BTreeMap<String, MessageRow>>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<VecDeque<RemoteError>>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a row in the conversations table without recording a call
    pub fn seed_conversation(&self, row: ConversationRow) {
        lock(&self.conversations).insert(row.id.clone(), row);
    }

    /// Place a row in the messages table without recording a call
    pub fn seed_message(&self, row: MessageRow) {
        lock(&self.messages).insert(row.id.clone(), row);
    }

    /// Script the next call to fail with the given error
    ///
    /// Failures are consumed first-in first-out, one per call.
    pub fn push_failure(&self, error: RemoteError) {
        lock(&self.failures).push_back(error);
    }

    /// All calls observed so far
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Current conversation rows, by id
    #[must_use]
    pub fn conversation(&self, id: &str) -> Option<ConversationRow> {
        lock(&self.conversations).get(id).cloned()
    }

    /// Current message rows, by id
    #[must_use]
    pub fn message(&self, id: &str) -> Option<MessageRow> {
        lock(&self.messages).get(id).cloned()
    }

    fn observe(&self, call: RemoteCall) -> RemoteResult<()> {
        lock(&self.calls).push(call);
        match lock(&self.failures).pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn create_conversation(&self, row: &ConversationRow) -> RemoteResult<()> {
        self.observe(RemoteCall::CreateConversation(row.id.clone()))?;
        let mut table = lock(&self.conversations);
        if table.contains_key(&row.id) {
            return Err(RemoteError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_conversation(&self, id: &str, row: &ConversationRow) -> RemoteResult<()> {
        self.observe(RemoteCall::UpdateConversation(id.to_string()))?;
        // A filtered PATCH on a missing row matches nothing and succeeds.
        if let Some(existing) = lock(&self.conversations).get_mut(id) {
            *existing = row.clone();
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> RemoteResult<()> {
        self.observe(RemoteCall::DeleteConversation(id.to_string()))?;
        lock(&self.conversations).remove(id);
        Ok(())
    }

    async fn create_message(&self, row: &MessageRow) -> RemoteResult<()> {
        self.observe(RemoteCall::CreateMessage(row.id.clone()))?;
        let mut table = lock(&self.messages);
        if table.contains_key(&row.id) {
            return Err(RemoteError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_message(&self, id: &str, row: &MessageRow) -> RemoteResult<()> {
        self.observe(RemoteCall::UpdateMessage(id.to_string()))?;
        if let Some(existing) = lock(&self.messages).get_mut(id) {
            *existing = row.clone();
        }
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> RemoteResult<()> {
        self.observe(RemoteCall::DeleteMessage(id.to_string()))?;
        lock(&self.messages).remove(id);
        Ok(())
    }

    async fn conversations_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<ConversationRow>> {
        self.observe(RemoteCall::ListConversations)?;
        let mut rows: Vec<ConversationRow> = lock(&self.conversations)
            .values()
            .filter(|row| row.updated_at > since)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.updated_at);
        Ok(rows)
    }

    async fn messages_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<MessageRow>> {
        self.observe(RemoteCall::ListMessages)?;
        let mut rows: Vec<MessageRow> = lock(&self.messages)
            .values()
            .filter(|row| row.created_at > since)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }
}
