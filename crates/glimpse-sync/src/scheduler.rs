//! Timer primitives owned by the sync service
//!
//! Built on `tokio::time` so tests drive them with a paused virtual clock
//! instead of wall-clock delays.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Cancellable one-shot timer that coalesces bursts of events
///
/// Each `touch` re-arms the deadline; `fired` resolves once the deadline
/// passes without another touch, and never resolves while unarmed.
pub struct Debouncer {
    delay: Duration,
    deadline: Mutex<Option<Instant>>,
}

impl Debouncer {
    /// Create an unarmed debouncer with the given quiet period
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: Mutex::new(None),
        }
    }

    /// Arm the timer, or push an armed deadline further out
    pub fn touch(&self) {
        *self.lock() = Some(Instant::now() + self.delay);
    }

    /// Disarm without firing
    pub fn cancel(&self) {
        *self.lock() = None;
    }

    /// Whether a deadline is pending
    pub fn is_armed(&self) -> bool {
        self.lock().is_some()
    }

    /// Resolve at the current deadline; pending forever while unarmed
    ///
    /// A touch that lands after this future was created is observed on the
    /// next poll loop iteration, which is exactly how the service's select
    /// loop recreates it.
    pub async fn fired(&self) {
        loop {
            let deadline = *self.lock();
            match deadline {
                None => std::future::pending::<()>().await,
                Some(deadline) => {
                    tokio::time::sleep_until(deadline).await;
                    let mut guard = self.lock();
                    if guard.is_some_and(|d| d <= Instant::now()) {
                        *guard = None;
                        return;
                    }
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodic ticker whose first tick fires one full period after creation
#[must_use]
pub fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
