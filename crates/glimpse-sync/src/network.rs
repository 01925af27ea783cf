//! Connectivity signalling

use tokio::sync::watch;

/// Online/offline signal with transition notifications
///
/// The offline→online transition is the canonical trigger to resume
/// synchronization; going offline only suppresses further attempts.
pub trait NetworkMonitor: Send + Sync {
    /// Current connectivity state
    fn is_online(&self) -> bool;

    /// Watch for transitions; dropping the receiver unsubscribes
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity state driven by platform callbacks
///
/// The host application feeds OS reachability events into `set_online`;
/// tests drive it directly.
pub struct NetworkState {
    online: watch::Sender<bool>,
}

impl NetworkState {
    /// Create with the given initial state
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (online, _) = watch::channel(initially_online);
        Self { online }
    }

    /// Report a connectivity change; repeated reports of the same state
    /// produce no notification
    pub fn set_online(&self, online: bool) {
        self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for NetworkState {
    fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}
