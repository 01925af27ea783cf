//! Sync orchestration
//!
//! One background worker drives the whole engine: it waits on the write
//! debouncer, a periodic ticker, and connectivity transitions, and runs a
//! push-then-pull cycle when any of them fire. Cycles never overlap; a
//! trigger that lands mid-cycle is dropped and the next timer picks up any
//! unfinished work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::db::{local_store, Checkpoint, Database, LocalStore, SyncQueue};
use crate::error::Result;
use crate::models::{EntityKind, OperationKind, OperationPayload, SyncOperation, SyncStatus};
use crate::network::NetworkMonitor;
use crate::remote::{ConversationRow, MessageRow, RemoteError, RemoteResult, RemoteStore};
use crate::scheduler::{self, Debouncer};
use crate::writer::LocalWriter;

/// Aggregate counters for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    /// Records awaiting remote confirmation
    pub pending: u64,
    /// Records whose operations failed terminally
    pub error: u64,
    /// Records confirmed by the remote
    pub synced: u64,
    /// Operations still queued
    pub queued: u64,
    /// Whether a cycle is running right now
    pub syncing: bool,
}

/// How the push phase ended
enum PushOutcome {
    /// Every queued operation was attempted
    Completed,
    /// The remote rejected our credentials; nothing was dequeued
    AuthFailed,
}

struct Inner {
    db: Arc<Database>,
    store: LocalStore,
    queue: SyncQueue,
    checkpoint: Checkpoint,
    remote: Option<Arc<dyn RemoteStore>>,
    network: Arc<dyn NetworkMonitor>,
    config: SyncConfig,
    syncing: AtomicBool,
    write_signal: Arc<Notify>,
}

/// The sync engine's orchestrator
///
/// Construct with explicit dependencies, then `start()` to spawn the
/// background worker and `stop()` to shut it down. All remote failures are
/// absorbed here; callers of the write API never see them.
pub struct SyncService {
    inner: Arc<Inner>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl SyncService {
    /// Create a service over the shared database
    ///
    /// A `None` remote means sync is unconfigured: local writes still work
    /// and queue up, every cycle aborts silently.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        remote: Option<Arc<dyn RemoteStore>>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        let inner = Inner {
            store: LocalStore::new(Arc::clone(&db)),
            queue: SyncQueue::new(Arc::clone(&db)),
            checkpoint: Checkpoint::new(Arc::clone(&db)),
            db,
            remote,
            network,
            config,
            syncing: AtomicBool::new(false),
            write_signal: Arc::new(Notify::new()),
        };
        Self {
            inner: Arc::new(inner),
            shutdown: None,
            task: None,
        }
    }

    /// Build the UI-facing write API wired to this service's debouncer
    #[must_use]
    pub fn writer(&self) -> LocalWriter {
        LocalWriter::new(
            Arc::clone(&self.inner.db),
            Arc::clone(&self.inner.write_signal),
        )
    }

    /// Spawn the background worker; idempotent
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        self.task = Some(tokio::spawn(run_loop(inner, rx)));
        self.shutdown = Some(tx);
        tracing::info!("sync service started");
    }

    /// Stop the background worker and wait for it to exit
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!("sync service stopped");
    }

    /// Run one guarded sync cycle inline
    pub async fn sync_now(&self) {
        self.inner.run_cycle().await;
    }

    /// Whether a cycle is running right now
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    /// Aggregate counters for UI display
    pub fn stats(&self) -> Result<SyncStats> {
        let counts = self.inner.store.status_counts()?;
        Ok(SyncStats {
            pending: counts.pending,
            error: counts.error,
            synced: counts.synced,
            queued: self.inner.queue.len()?,
            syncing: self.is_syncing(),
        })
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

async fn run_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    let debouncer = Debouncer::new(inner.config.debounce);
    let mut ticker = scheduler::ticker(inner.config.sync_interval);
    let mut online = inner.network.subscribe();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            () = inner.write_signal.notified() => debouncer.touch(),
            () = debouncer.fired() => inner.run_cycle().await,
            _ = ticker.tick() => inner.run_cycle().await,
            changed = online.changed() => match changed {
                Ok(()) => {
                    if *online.borrow_and_update() {
                        tracing::debug!("connectivity restored, resuming sync");
                        inner.run_cycle().await;
                    }
                }
                // Monitor dropped; connectivity can no longer change.
                Err(_) => break,
            },
        }
    }
    tracing::debug!("sync loop exited");
}

impl Inner {
    /// Run one cycle unless one is running, we're offline, or unconfigured
    async fn run_cycle(&self) {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        if !self.network.is_online() {
            return;
        }
        if self.syncing.swap(true, Ordering::SeqCst) {
            tracing::debug!("sync cycle already running, dropping trigger");
            return;
        }

        if let Err(error) = self.cycle(remote.as_ref()).await {
            tracing::warn!("sync cycle failed: {error}");
        }
        self.syncing.store(false, Ordering::SeqCst);
    }

    async fn cycle(&self, remote: &dyn RemoteStore) -> Result<()> {
        match self.push_phase(remote).await? {
            PushOutcome::AuthFailed => {
                tracing::warn!("remote rejected credentials; queue left untouched");
                return Ok(());
            }
            PushOutcome::Completed => {}
        }
        self.pull_phase(remote).await
    }

    /// Drain the queue in FIFO order; failures are isolated per operation
    async fn push_phase(&self, remote: &dyn RemoteStore) -> Result<PushOutcome> {
        let ops = self.queue.list_pending()?;
        if ops.is_empty() {
            return Ok(PushOutcome::Completed);
        }
        tracing::debug!("pushing {} queued operations", ops.len());

        for op in ops {
            let entity = op.payload.entity_kind();
            let entity_id = op.payload.entity_id();

            match execute(remote, &op).await {
                Ok(()) | Err(RemoteError::Conflict(_)) => {
                    // Creation is idempotent by id: the remote already
                    // holding this record is as good as a fresh insert.
                    self.queue.remove(&op.id)?;
                    self.store
                        .mark_synced(entity, &entity_id, Utc::now().timestamp_millis())?;
                }
                Err(RemoteError::Auth(reason)) => {
                    tracing::warn!("push halted: {reason}");
                    return Ok(PushOutcome::AuthFailed);
                }
                Err(error) if error.is_retriable() => {
                    let retries = self.queue.increment_retry(&op.id)?;
                    if retries >= self.config.max_retries {
                        tracing::warn!(
                            "operation {} for {entity} {entity_id} exhausted {retries} retries: {error}",
                            op.id
                        );
                        self.queue.remove(&op.id)?;
                        self.store.mark_error(entity, &entity_id)?;
                    } else {
                        tracing::debug!(
                            "operation {} failed transiently (attempt {retries}): {error}",
                            op.id
                        );
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        "operation {} for {entity} {entity_id} failed permanently: {error}",
                        op.id
                    );
                    self.queue.remove(&op.id)?;
                    self.store.mark_error(entity, &entity_id)?;
                }
            }
        }
        Ok(PushOutcome::Completed)
    }

    /// Merge remote changes since the checkpoint into the local store
    async fn pull_phase(&self, remote: &dyn RemoteStore) -> Result<()> {
        let since_ms = self.checkpoint.get()?;
        let since = DateTime::from_timestamp_millis(since_ms).unwrap_or(DateTime::UNIX_EPOCH);
        // Rows written remotely while this pull runs land in the next
        // window, so the boundary is captured before the queries.
        let window_end = Utc::now().timestamp_millis();

        let conversations = match remote.conversations_changed_since(since).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!("pull aborted while listing conversations: {error}");
                return Ok(());
            }
        };
        let messages = match remote.messages_changed_since(since).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!("pull aborted while listing messages: {error}");
                return Ok(());
            }
        };

        for row in &conversations {
            self.merge_conversation(row)?;
        }
        for row in &messages {
            self.merge_message(row)?;
        }

        self.checkpoint.set(window_end)?;
        tracing::debug!(
            "pulled {} conversations and {} messages since {since_ms}",
            conversations.len(),
            messages.len()
        );
        Ok(())
    }

    /// Last-write-wins merge of one remote conversation
    ///
    /// A local `pending` record always wins until it has been pushed;
    /// otherwise the strictly newer `updated_at` wins.
    fn merge_conversation(&self, row: &ConversationRow) -> Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        let incoming = match row.try_to_local(now_ms) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!("skipping malformed remote conversation: {error}");
                return Ok(());
            }
        };

        self.db.with_conn(|conn| {
            let Some(local) = local_store::get_conversation(conn, &incoming.id)? else {
                return local_store::upsert_conversation(conn, &incoming);
            };

            let incoming_ms = incoming.updated_at;
            if local.sync_status == SyncStatus::Pending {
                if incoming_ms > local.updated_at {
                    local_store::record_conflict(
                        conn,
                        EntityKind::Conversation,
                        &incoming.id.as_str(),
                        local.updated_at,
                        incoming_ms,
                        "pending-preserved",
                    )?;
                }
                return Ok(());
            }

            if incoming_ms > local.updated_at {
                local_store::upsert_conversation(conn, &incoming)
            } else if incoming_ms < local.updated_at {
                local_store::record_conflict(
                    conn,
                    EntityKind::Conversation,
                    &incoming.id.as_str(),
                    local.updated_at,
                    incoming_ms,
                    "lww",
                )
            } else {
                Ok(())
            }
        })
    }

    /// Insert one remote message if unseen; existing messages are
    /// append-only and never touched
    fn merge_message(&self, row: &MessageRow) -> Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        let incoming = match row.try_to_local(now_ms) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!("skipping malformed remote message: {error}");
                return Ok(());
            }
        };

        self.db.with_conn(|conn| {
            if local_store::get_message(conn, &incoming.id)?.is_none() {
                local_store::upsert_message(conn, &incoming)?;
            }
            Ok(())
        })
    }
}

/// Send one queued operation to the remote
async fn execute(remote: &dyn RemoteStore, op: &SyncOperation) -> RemoteResult<()> {
    match (&op.payload, op.kind) {
        (OperationPayload::Conversation(c), OperationKind::Create) => {
            remote.create_conversation(&ConversationRow::from(c)).await
        }
        (OperationPayload::Conversation(c), OperationKind::Update) => {
            let row = ConversationRow::from(c);
            remote.update_conversation(&row.id, &row).await
        }
        (OperationPayload::Conversation(c), OperationKind::Delete) => {
            remote.delete_conversation(&c.id.as_str()).await
        }
        (OperationPayload::Message(m), OperationKind::Create) => {
            remote.create_message(&MessageRow::from(m)).await
        }
        (OperationPayload::Message(m), OperationKind::Update) => {
            let row = MessageRow::from(m);
            remote.update_message(&row.id, &row).await
        }
        (OperationPayload::Message(m), OperationKind::Delete) => {
            remote.delete_message(&m.id.as_str()).await
        }
    }
}
