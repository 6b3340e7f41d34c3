//! Error types for store operations.

use thiserror::Error;

/// A store call that failed as a whole (network, auth, malformed request).
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The request could not be completed.
    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    /// The store refused the whole request for lack of capacity.
    ///
    /// Batch calls never surface this; they report every entry as
    /// unprocessed instead.
    #[error("{operation} throttled")]
    Throttled { operation: &'static str },

    /// The request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The store returned data that does not look like one of our items.
    #[error("Malformed item: {0}")]
    MalformedItem(String),
}

impl StoreError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        StoreError::Request {
            operation,
            message: message.into(),
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, StoreError::Throttled { .. })
    }
}
