//! Bounded, append-only outbox in front of a [`QueueSender`].
//!
//! Producers call [`OutboxHandle::notify`], which never waits: when the
//! outbox is full the message is dropped and counted. A single background
//! task drains the outbox in order and delivers each message once.

use crate::message::RedistributionMessage;
use crate::sender::QueueSender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Delivery counters for one outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStats {
    pub delivered: u64,
    pub failed: u64,
    /// Rejected at `notify` time because the outbox was full or closed
    pub dropped: u64,
}

/// Producer side of the outbox. Cheap to clone.
#[derive(Clone, Debug)]
pub struct OutboxHandle {
    tx: mpsc::Sender<RedistributionMessage>,
    dropped: Arc<AtomicU64>,
}

impl OutboxHandle {
    /// Enqueue a message without waiting. Returns whether it was accepted.
    pub fn notify(&self, message: RedistributionMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Redistribution outbox full, dropping notification for shard #{} ({} items)",
                    message.shard_number,
                    message.items.len()
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Redistribution outbox closed, dropping notification for shard #{}",
                    message.shard_number
                );
                false
            }
        }
    }
}

/// Consumer side of the outbox.
pub struct OutboxTask {
    handle: JoinHandle<OutboxStats>,
    dropped: Arc<AtomicU64>,
}

impl OutboxTask {
    /// Wait for the outbox to drain and return its counters.
    ///
    /// Completes once every [`OutboxHandle`] clone has been dropped.
    pub async fn finish(self) -> OutboxStats {
        let mut stats = match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Redistribution outbox task ended abnormally: {e}");
                OutboxStats::default()
            }
        };
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }
}

/// Start the delivery task for `sender` with room for `capacity` pending messages.
pub fn spawn_outbox<S: QueueSender>(sender: S, capacity: usize) -> (OutboxHandle, OutboxTask) {
    let (tx, mut rx) = mpsc::channel::<RedistributionMessage>(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let handle = tokio::spawn(async move {
        let mut stats = OutboxStats::default();
        while let Some(message) = rx.recv().await {
            let shard = message.shard_number;
            let result = match message.to_body() {
                Ok(body) => sender.send(body).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    stats.delivered += 1;
                    debug!("Notified {} for shard #{shard}", sender.destination());
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!("Redistribution notification for shard #{shard} lost: {e}");
                }
            }
        }
        stats
    });

    (
        OutboxHandle {
            tx,
            dropped: dropped.clone(),
        },
        OutboxTask { handle, dropped },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailingQueue, MemoryQueue};
    use workload_types::{Item, ShardNumber};

    fn message(shard: u32) -> RedistributionMessage {
        RedistributionMessage::new(
            ShardNumber::new(shard),
            vec![Item::new(format!("SinglePK#{shard}"), "a#1", "p")],
        )
    }

    #[tokio::test]
    async fn test_outbox_delivers_in_order() {
        let queue = MemoryQueue::new();
        let (outbox, task) = spawn_outbox(queue.clone(), 8);

        for shard in 1..=3 {
            assert!(outbox.notify(message(shard)));
        }
        drop(outbox);

        let stats = task.finish().await;
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.failed, 0);

        let shards: Vec<u32> = queue.messages().iter().map(|m| m.shard_number.get()).collect();
        assert_eq!(shards, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delivery_failures_are_counted_not_raised() {
        let (outbox, task) = spawn_outbox(FailingQueue, 8);
        outbox.notify(message(1));
        outbox.notify(message(2));
        drop(outbox);

        let stats = task.finish().await;
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_full_outbox_drops_instead_of_blocking() {
        let queue = MemoryQueue::new();
        let (outbox, task) = spawn_outbox(queue.clone(), 2);

        // The delivery task cannot run until we yield, so the third message
        // finds the channel full.
        assert!(outbox.notify(message(1)));
        assert!(outbox.notify(message(2)));
        assert!(!outbox.notify(message(3)));
        drop(outbox);

        let stats = task.finish().await;
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(queue.len(), 2);
    }
}
