//! Key-value store abstraction for the load generator.
//!
//! Provides the [`KvStore`] trait consumed by the batch executor plus two
//! backends:
//!
//! - [`DynamoStore`] - Amazon DynamoDB (`PK` / `SK` / `Payload` attributes)
//! - [`MemoryStore`] - In-process store with configurable throttling, used
//!   for local dry runs and tests
//!
//! Partial throttling is part of every outcome (unprocessed items, keys or a
//! throttled flag), never an error. [`StoreError`] is reserved for calls that
//! failed as a whole.

mod dynamo;
mod error;
mod memory;
mod outcome;
mod store;

pub use dynamo::{DynamoStore, DynamoStoreConfig, ATTR_PARTITION_KEY, ATTR_PAYLOAD, ATTR_SORT_KEY};
pub use error::StoreError;
pub use memory::{MemoryStore, MemoryStoreStats};
pub use outcome::{GetOutcome, QueryOutcome, UpdateOutcome, WriteOutcome};
pub use store::KvStore;
