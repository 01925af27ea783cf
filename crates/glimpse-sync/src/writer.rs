//! UI-facing write API
//!
//! Every write lands in the local store and appends its sync operation in
//! one transaction, so a record can never be `pending` without a queued
//! operation or vice versa. Writes succeed immediately whether or not the
//! device is online; only local storage failures surface to the caller.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::db::{local_store, sync_queue, Database};
use crate::error::{Error, Result};
use crate::models::{
    Conversation, ConversationId, Message, MessageId, OperationKind, OperationPayload, Role,
    SyncOperation, SyncStatus,
};

/// The only mutator of the local store besides the sync service
pub struct LocalWriter {
    db: Arc<Database>,
    signal: Arc<Notify>,
}

impl LocalWriter {
    /// Create a writer; `signal` is pinged after every committed write
    #[must_use]
    pub fn new(db: Arc<Database>, signal: Arc<Notify>) -> Self {
        Self { db, signal }
    }

    /// Create a conversation
    pub fn create_conversation(
        &self,
        title: &str,
        owner_id: Option<&str>,
    ) -> Result<Conversation> {
        let conversation = Conversation::new(title, owner_id.map(ToString::to_string));
        let op = SyncOperation::new(
            OperationKind::Create,
            OperationPayload::Conversation(conversation.clone()),
        );

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            local_store::upsert_conversation(&tx, &conversation)?;
            sync_queue::enqueue(&tx, &op)?;
            tx.commit()?;
            Ok(())
        })?;

        self.signal.notify_one();
        Ok(conversation)
    }

    /// Rename a conversation
    pub fn rename_conversation(&self, id: &ConversationId, title: &str) -> Result<Conversation> {
        let updated = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut conversation = local_store::get_conversation(&tx, id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            conversation.title = title.to_string();
            conversation.updated_at = chrono::Utc::now().timestamp_millis();
            conversation.sync_status = SyncStatus::Pending;

            local_store::upsert_conversation(&tx, &conversation)?;
            sync_queue::enqueue(
                &tx,
                &SyncOperation::new(
                    OperationKind::Update,
                    OperationPayload::Conversation(conversation.clone()),
                ),
            )?;
            tx.commit()?;
            Ok(conversation)
        })?;

        self.signal.notify_one();
        Ok(updated)
    }

    /// Delete a conversation and its messages, queueing the remote deletes
    ///
    /// Message deletes are enqueued before the conversation delete so they
    /// reach the remote first.
    pub fn delete_conversation(&self, id: &ConversationId) -> Result<()> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let conversation = local_store::get_conversation(&tx, id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let messages = local_store::get_messages(&tx, id)?;

            local_store::delete_conversation(&tx, id)?;

            for message in messages {
                sync_queue::enqueue(
                    &tx,
                    &SyncOperation::new(
                        OperationKind::Delete,
                        OperationPayload::Message(message),
                    ),
                )?;
            }
            sync_queue::enqueue(
                &tx,
                &SyncOperation::new(
                    OperationKind::Delete,
                    OperationPayload::Conversation(conversation),
                ),
            )?;
            tx.commit()?;
            Ok(())
        })?;

        self.signal.notify_one();
        Ok(())
    }

    /// Append a message to a conversation
    pub fn append_message(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        let message = Message::new(*conversation_id, role, content);
        let op = SyncOperation::new(
            OperationKind::Create,
            OperationPayload::Message(message.clone()),
        );

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            if local_store::get_conversation(&tx, conversation_id)?.is_none() {
                return Err(Error::NotFound(conversation_id.to_string()));
            }
            local_store::upsert_message(&tx, &message)?;
            sync_queue::enqueue(&tx, &op)?;
            tx.commit()?;
            Ok(())
        })?;

        self.signal.notify_one();
        Ok(message)
    }

    /// Replace a message's content (the author's in-flight streaming update)
    pub fn update_message_content(&self, id: &MessageId, content: &str) -> Result<Message> {
        let updated = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut message = local_store::get_message(&tx, id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            message.content = content.to_string();
            message.sync_status = SyncStatus::Pending;

            local_store::upsert_message(&tx, &message)?;
            sync_queue::enqueue(
                &tx,
                &SyncOperation::new(
                    OperationKind::Update,
                    OperationPayload::Message(message.clone()),
                ),
            )?;
            tx.commit()?;
            Ok(message)
        })?;

        self.signal.notify_one();
        Ok(updated)
    }

    /// Delete a message
    pub fn delete_message(&self, id: &MessageId) -> Result<()> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let message = local_store::get_message(&tx, id)?
                .ok_or_else(|| Error::NotFound(id.to_string()))?;

            local_store::delete_message(&tx, id)?;
            sync_queue::enqueue(
                &tx,
                &SyncOperation::new(OperationKind::Delete, OperationPayload::Message(message)),
            )?;
            tx.commit()?;
            Ok(())
        })?;

        self.signal.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LocalStore, SyncQueue};
    use crate::models::EntityKind;
    use pretty_assertions::assert_eq;

    fn setup() -> (LocalWriter, LocalStore, SyncQueue) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let writer = LocalWriter::new(Arc::clone(&db), Arc::new(Notify::new()));
        let store = LocalStore::new(Arc::clone(&db));
        let queue = SyncQueue::new(db);
        (writer, store, queue)
    }

    #[test]
    fn test_create_conversation_writes_record_and_op() {
        let (writer, store, queue) = setup();

        let conversation = writer.create_conversation("Chat", Some("user-1")).unwrap();

        let stored = store.get_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Pending);

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, OperationKind::Create);
        assert_eq!(pending[0].payload.entity_id(), conversation.id.as_str());
    }

    #[test]
    fn test_rename_enqueues_update() {
        let (writer, store, queue) = setup();
        let conversation = writer.create_conversation("Before", None).unwrap();

        let renamed = writer
            .rename_conversation(&conversation.id, "After")
            .unwrap();
        assert_eq!(renamed.title, "After");
        assert!(renamed.updated_at >= conversation.updated_at);

        let stored = store.get_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(stored.title, "After");

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, OperationKind::Create);
        assert_eq!(pending[1].kind, OperationKind::Update);
    }

    #[test]
    fn test_rename_missing_conversation_fails_cleanly() {
        let (writer, _, queue) = setup();

        let err = writer
            .rename_conversation(&ConversationId::new(), "x")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        // Nothing half-written
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_delete_conversation_cascades_and_orders_ops() {
        let (writer, store, queue) = setup();
        let conversation = writer.create_conversation("Doomed", None).unwrap();
        let message = writer
            .append_message(&conversation.id, Role::User, "hello")
            .unwrap();

        writer.delete_conversation(&conversation.id).unwrap();

        assert!(store.get_conversation(&conversation.id).unwrap().is_none());
        assert!(store.get_message(&message.id).unwrap().is_none());

        let pending = queue.list_pending().unwrap();
        let deletes: Vec<_> = pending
            .iter()
            .filter(|op| op.kind == OperationKind::Delete)
            .collect();
        assert_eq!(deletes.len(), 2);
        // Message delete first, conversation delete last
        assert_eq!(deletes[0].payload.entity_kind(), EntityKind::Message);
        assert_eq!(deletes[1].payload.entity_kind(), EntityKind::Conversation);
    }

    #[test]
    fn test_append_message_requires_conversation() {
        let (writer, _, queue) = setup();

        let err = writer
            .append_message(&ConversationId::new(), Role::User, "orphan")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_streaming_update_re_pends_message() {
        let (writer, store, queue) = setup();
        let conversation = writer.create_conversation("Chat", None).unwrap();
        let message = writer
            .append_message(&conversation.id, Role::Assistant, "Thinking")
            .unwrap();

        let updated = writer
            .update_message_content(&message.id, "Thinking... done")
            .unwrap();
        assert_eq!(updated.content, "Thinking... done");

        let stored = store.get_message(&message.id).unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Pending);
        assert_eq!(stored.content, "Thinking... done");

        // create conversation + create message + update message
        assert_eq!(queue.len().unwrap(), 3);
    }

    #[test]
    fn test_writes_signal_the_debouncer() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let signal = Arc::new(Notify::new());
        let writer = LocalWriter::new(db, Arc::clone(&signal));

        writer.create_conversation("Ping", None).unwrap();

        // The permit is stored even with no waiter yet.
        let waited = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(async {
                tokio::time::timeout(std::time::Duration::from_millis(10), signal.notified())
                    .await
            });
        assert!(waited.is_ok());
    }
}
