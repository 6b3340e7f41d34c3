//! Load generation workers for a single hot DynamoDB partition.
//!
//! A worker runs one [`WorkloadDriver`] for one role (insert, read or update).
//! Each iteration the driver asks its [`LoadController`] how much work to do,
//! hands the operation to the [`BatchExecutor`] and, for inserts, passes
//! throttled items to the [`ThrottleHandler`], which moves them to shard
//! partitions and notifies the redistribution queue.
//!
//! ## Architecture
//!
//! ```text
//!   WorkloadDriver ──► LoadController        (ramp: load, rate, cadence, limit)
//!        │
//!        ├──► KeySampler ──► KvStore::query  (read / update only)
//!        │
//!        ├──► BatchExecutor ──► KvStore      (chunks of 25, bounded in flight)
//!        │
//!        └──► ThrottleHandler ──► KvStore    (writes to <pk>#<n>)
//!                    │
//!                    └──► OutboxHandle ──► SQS (best effort)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # One insert worker against DynamoDB, configured from the environment
//! TABLE_NAME=loadtest QUEUE_URL=https://sqs... LOAD=200 DURATION=60 \
//!   lazy-shard-loadtest worker --role insert
//!
//! # Aggregate the metrics files of a finished run
//! lazy-shard-loadtest aggregate ./results
//! ```

pub mod aggregator;
pub mod cli;
pub mod driver;
pub mod environment;
pub mod executor;
pub mod load;
pub mod metrics;
pub mod reshard;
pub mod sampler;
pub mod worker;

pub use aggregator::*;
pub use cli::*;
pub use driver::{DriverReport, DriverSettings, WorkloadDriver};
pub use environment::*;
pub use executor::{chunk_count, BatchExecutor, BatchOperation, ExecutionFailure, ExecutorLimits, ItemUpdate};
pub use load::LoadController;
pub use metrics::*;
pub use reshard::{ReshardError, ReshardReport, ThrottleHandler};
pub use sampler::{KeySampler, Sample};
pub use worker::*;
