//! Core types for the lazy-shard load testing framework.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`Item`] / [`ItemKey`] - Records written to and read from the store
//! - [`ShardNumber`] / [`ShardRange`] - The `<pk>#<n>` shard naming convention
//! - [`WorkloadConfig`] / [`WorkloadRole`] - Per-worker load settings
//! - [`BatchResult`] - Merged outcome of one executed batch
//! - [`RunningTotals`] - Per-driver counters reported on completion
//!
//! # Architecture
//!
//! ```text
//! workload-types (this crate)
//!    │
//!    ├─── loadtest-generator  (synthesizes items)
//!    ├─── kv-store            (store trait, DynamoDB + in-memory backends)
//!    ├─── reshard-queue       (redistribution notifications)
//!    ├─── loadtest-worker     (load controller, executor, resharding, drivers)
//!    └─── orchestrator        (phase state machine)
//! ```

pub mod batch;
pub mod config;
pub mod item;
pub mod shard;
pub mod totals;

pub use batch::BatchResult;
pub use config::{ConfigError, WorkloadConfig, WorkloadRole};
pub use item::{Item, ItemKey, DEFAULT_PARTITION_KEY};
pub use shard::{ShardNumber, ShardRange, SHARD_SEPARATOR};
pub use totals::RunningTotals;

/// Maximum number of items the store accepts in one batch request.
pub const MAX_BATCH_ITEMS: usize = 25;
