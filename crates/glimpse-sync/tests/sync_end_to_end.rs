//! End-to-end engine scenarios: the full service lifecycle driven through
//! its real triggers against an in-memory remote.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use glimpse_sync::models::Role;
use glimpse_sync::remote::{ConversationRow, MessageRow, RemoteCall, RemoteResult};
use glimpse_sync::{
    Conversation, Database, InMemoryRemoteStore, NetworkMonitor, NetworkState, RemoteStore,
    SyncConfig, SyncService,
};

fn engine(
    initially_online: bool,
    config: SyncConfig,
) -> (SyncService, Arc<InMemoryRemoteStore>, Arc<NetworkState>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let remote = Arc::new(InMemoryRemoteStore::new());
    let network = Arc::new(NetworkState::new(initially_online));
    let service = SyncService::new(
        db,
        Some(Arc::clone(&remote) as Arc<dyn RemoteStore>),
        Arc::clone(&network) as Arc<dyn NetworkMonitor>,
        config,
    );
    (service, remote, network)
}

async fn wait_until_drained(service: &SyncService) {
    for _ in 0..100 {
        let stats = service.stats().unwrap();
        if stats.queued == 0 && !stats.syncing {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("queue never drained");
}

#[tokio::test(start_paused = true)]
async fn offline_writes_sync_after_reconnect() {
    let config = SyncConfig::default()
        .with_debounce(Duration::from_millis(500))
        .with_sync_interval(Duration::from_secs(600));
    let (mut service, remote, network) = engine(false, config);
    let writer = service.writer();
    service.start();

    let conversation = writer.create_conversation("Written offline", None).unwrap();
    writer
        .append_message(&conversation.id, Role::User, "queued while offline")
        .unwrap();

    // Let the debounce fire while offline: the cycle must abort silently.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(remote.calls().is_empty());
    assert_eq!(service.stats().unwrap().pending, 2);

    network.set_online(true);
    wait_until_drained(&service).await;

    assert!(remote.conversation(&conversation.id.as_str()).is_some());
    let stats = service.stats().unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.synced, 2);

    service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_bursts_into_one_cycle() {
    let config = SyncConfig::default()
        .with_debounce(Duration::from_secs(1))
        .with_sync_interval(Duration::from_secs(600));
    let (mut service, remote, _network) = engine(true, config);
    let writer = service.writer();
    service.start();

    writer.create_conversation("one", None).unwrap();
    writer.create_conversation("two", None).unwrap();
    writer.create_conversation("three", None).unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    wait_until_drained(&service).await;

    // One cycle for the whole burst: a single pull follows the three pushes.
    let pulls = remote
        .calls()
        .into_iter()
        .filter(|call| *call == RemoteCall::ListConversations)
        .count();
    assert_eq!(pulls, 1);

    service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn periodic_tick_pulls_remote_changes() {
    let config = SyncConfig::default().with_sync_interval(Duration::from_secs(30));
    let (mut service, remote, _network) = engine(true, config);
    service.start();

    let conversation = Conversation::new("Made elsewhere", None);
    remote.seed_conversation(ConversationRow::from(&conversation));
    let message = glimpse_sync::Message::new(conversation.id, Role::Assistant, "hello");
    remote.seed_message(MessageRow::from(&message));

    tokio::time::sleep(Duration::from_secs(31)).await;
    for _ in 0..100 {
        if service.stats().unwrap().synced == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let stats = service.stats().unwrap();
    assert_eq!(stats.synced, 2);
    assert_eq!(stats.pending, 0);

    service.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopped_service_runs_no_more_cycles() {
    let config = SyncConfig::default().with_sync_interval(Duration::from_secs(30));
    let (mut service, remote, _network) = engine(true, config);
    let writer = service.writer();
    service.start();
    service.stop().await;

    writer.create_conversation("after stop", None).unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(remote.calls().is_empty());
    assert_eq!(service.stats().unwrap().queued, 1);
}

/// Remote whose first create blocks until released, for overlap tests
struct GatedRemote {
    inner: InMemoryRemoteStore,
    gate: Notify,
    entered: Notify,
}

impl GatedRemote {
    fn new() -> Self {
        Self {
            inner: InMemoryRemoteStore::new(),
            gate: Notify::new(),
            entered: Notify::new(),
        }
    }
}

#[async_trait]
impl RemoteStore for GatedRemote {
    async fn create_conversation(&self, row: &ConversationRow) -> RemoteResult<()> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.inner.create_conversation(row).await
    }

    async fn update_conversation(&self, id: &str, row: &ConversationRow) -> RemoteResult<()> {
        self.inner.update_conversation(id, row).await
    }

    async fn delete_conversation(&self, id: &str) -> RemoteResult<()> {
        self.inner.delete_conversation(id).await
    }

    async fn create_message(&self, row: &MessageRow) -> RemoteResult<()> {
        self.inner.create_message(row).await
    }

    async fn update_message(&self, id: &str, row: &MessageRow) -> RemoteResult<()> {
        self.inner.update_message(id, row).await
    }

    async fn delete_message(&self, id: &str) -> RemoteResult<()> {
        self.inner.delete_message(id).await
    }

    async fn conversations_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<ConversationRow>> {
        self.inner.conversations_changed_since(since).await
    }

    async fn messages_changed_since(&self, since: DateTime<Utc>) -> RemoteResult<Vec<MessageRow>> {
        self.inner.messages_changed_since(since).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_trigger_is_dropped_not_queued() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let remote = Arc::new(GatedRemote::new());
    let network = Arc::new(NetworkState::new(true));
    let service = Arc::new(SyncService::new(
        Arc::clone(&db),
        Some(Arc::clone(&remote) as Arc<dyn RemoteStore>),
        network as Arc<dyn NetworkMonitor>,
        SyncConfig::default(),
    ));
    let writer = service.writer();

    let conversation = writer.create_conversation("Contended", None).unwrap();

    let first = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.sync_now().await }
    });

    // Wait until the first cycle is inside the remote call, then trigger a
    // second cycle: it must no-op instead of waiting.
    remote.entered.notified().await;
    assert!(service.is_syncing());
    service.sync_now().await;
    assert!(service.is_syncing());

    remote.gate.notify_one();
    first.await.unwrap();
    assert!(!service.is_syncing());

    // Only the first cycle's calls happened.
    let creates = remote
        .inner
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RemoteCall::CreateConversation(_)))
        .count();
    assert_eq!(creates, 1);
    let pulls = remote
        .inner
        .calls()
        .into_iter()
        .filter(|call| *call == RemoteCall::ListConversations)
        .count();
    assert_eq!(pulls, 1);

    assert!(remote
        .inner
        .conversation(&conversation.id.as_str())
        .is_some());
    assert_eq!(service.stats().unwrap().synced, 1);
}
