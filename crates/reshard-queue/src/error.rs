use thiserror::Error;

/// A notification that could not be delivered.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to encode redistribution message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to send message to {queue}: {message}")]
    Send { queue: String, message: String },
}
