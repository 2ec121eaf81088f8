use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::time::{DelayQueue, delay_queue};

/// A single cancellable flush timer.
///
/// At most one expiration is pending at any time: arming an armed timer does nothing.
pub struct FlushTimer {
    queue: DelayQueue<()>,
    key: Option<delay_queue::Key>,
    interval: Duration,
}

impl FlushTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            queue: DelayQueue::new(),
            key: None,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_armed(&self) -> bool {
        self.key.is_some()
    }

    /// Schedules an expiration after the flush interval, unless one is already pending.
    ///
    /// Returns true if a new expiration was scheduled.
    pub fn arm(&mut self) -> bool {
        if self.key.is_some() {
            return false;
        }

        self.key = Some(self.queue.insert((), self.interval));
        true
    }

    /// Cancels the pending expiration, if any.
    pub fn cancel(&mut self) {
        if let Some(key) = self.key.take() {
            self.queue.try_remove(&key);
        }
    }

    /// Waits for the pending expiration. Never resolves if the timer is not armed.
    ///
    /// Cancel safe: dropping the future keeps the timer armed.
    pub async fn expired(&mut self) {
        match self.queue.next().await {
            Some(_) => {
                self.key = None;
            }
            None => std::future::pending().await,
        }
    }
}

impl std::fmt::Debug for FlushTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushTimer")
            .field("interval", &self.interval)
            .field("armed", &self.is_armed())
            .finish()
    }
}
