use crate::error::QueueError;

/// Transport for encoded redistribution messages.
#[async_trait::async_trait]
pub trait QueueSender: Send + Sync + 'static {
    /// Deliver one message body. No retries: failures are reported once.
    async fn send(&self, body: String) -> Result<(), QueueError>;

    /// Human-readable destination, used in log lines.
    fn destination(&self) -> &str;
}
