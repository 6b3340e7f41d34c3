//! Redistribution notifications for resharded items.
//!
//! When the throttle handler moves items from a hot partition to one of its
//! `<pk>#<n>` shards, a downstream consumer is told which items went where so
//! it can merge them back later. Delivery is at-most-once: notifications go
//! through a bounded [`outbox`] so a slow or failing queue never blocks the
//! write path.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reshard_queue::{spawn_outbox, RedistributionMessage, SqsSender};
//! use workload_types::{Item, ShardNumber};
//!
//! #[tokio::main]
//! async fn main() {
//!     let sender = SqsSender::connect("https://sqs.eu-west-1.amazonaws.com/123/reshard").await;
//!     let (outbox, task) = spawn_outbox(sender, 1024);
//!
//!     let items = vec![Item::new("SinglePK#4", "a#1", "payload")];
//!     outbox.notify(RedistributionMessage::new(ShardNumber::new(4), items));
//!
//!     drop(outbox);
//!     let stats = task.finish().await;
//!     println!("delivered {}", stats.delivered);
//! }
//! ```

mod error;
mod memory;
mod message;
pub mod outbox;
mod sender;
mod sqs;

pub use error::QueueError;
pub use memory::{FailingQueue, MemoryQueue};
pub use message::RedistributionMessage;
pub use outbox::{spawn_outbox, OutboxHandle, OutboxStats, OutboxTask, DEFAULT_OUTBOX_CAPACITY};
pub use sender::QueueSender;
pub use sqs::SqsSender;
