//! Pending-request queues - who is waiting to chat with whom
//!
//! One FIFO queue of requester names per target name. Draining is driven by the
//! router, which owns the pairing logic; this module only keeps the queues.

use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct PendingQueues {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `requester` to `target`'s queue
    pub async fn enqueue(&self, target: &str, requester: &str) {
        self.queues
            .lock()
            .await
            .entry(target.to_string())
            .or_default()
            .push_back(requester.to_string());
        tracing::debug!("{} queued for {}", requester, target);
    }

    /// Pop the oldest requester for `target`
    pub async fn take_head(&self, target: &str) -> Option<String> {
        let mut queues = self.queues.lock().await;
        let queue = queues.get_mut(target)?;
        let head = queue.pop_front();
        if queue.is_empty() {
            queues.remove(target);
        }
        head
    }

    /// Put a popped requester back at the tail
    pub async fn requeue(&self, target: &str, requester: String) {
        self.queues
            .lock()
            .await
            .entry(target.to_string())
            .or_default()
            .push_back(requester);
    }

    pub async fn len(&self, target: &str) -> usize {
        self.queues.lock().await.get(target).map_or(0, VecDeque::len)
    }

    /// Snapshot of `target`'s queue, head first
    pub async fn requesters(&self, target: &str) -> Vec<String> {
        self.queues
            .lock()
            .await
            .get(target)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}
