//! In-process senders for local runs and tests.

use crate::error::QueueError;
use crate::message::RedistributionMessage;
use crate::sender::QueueSender;
use std::sync::{Arc, Mutex};

/// Collects message bodies in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemoryQueue {
    bodies: Arc<Mutex<Vec<String>>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Decoded messages; bodies that do not parse are skipped.
    pub fn messages(&self) -> Vec<RedistributionMessage> {
        self.bodies()
            .iter()
            .filter_map(|body| serde_json::from_str(body).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bodies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl QueueSender for MemoryQueue {
    async fn send(&self, body: String) -> Result<(), QueueError> {
        self.bodies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(body);
        Ok(())
    }

    fn destination(&self) -> &str {
        "memory"
    }
}

/// Rejects every message.
#[derive(Clone, Debug, Default)]
pub struct FailingQueue;

#[async_trait::async_trait]
impl QueueSender for FailingQueue {
    async fn send(&self, _body: String) -> Result<(), QueueError> {
        Err(QueueError::Send {
            queue: self.destination().to_string(),
            message: "queue unavailable".to_string(),
        })
    }

    fn destination(&self) -> &str {
        "failing"
    }
}
