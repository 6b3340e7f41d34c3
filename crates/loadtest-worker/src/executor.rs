//! Chunked batch execution against a [`KvStore`].

use futures::stream::{self, StreamExt};
use kv_store::{KvStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use workload_types::{BatchResult, Item, ItemKey, MAX_BATCH_ITEMS};

/// Overwrite of one item's payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemUpdate {
    pub key: ItemKey,
    pub payload: String,
}

/// An operation over any number of items; the executor splits it into chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Write(Vec<Item>),
    Get(Vec<ItemKey>),
    Update(Vec<ItemUpdate>),
}

impl BatchOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            BatchOperation::Write(_) => "write",
            BatchOperation::Get(_) => "get",
            BatchOperation::Update(_) => "update",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BatchOperation::Write(items) => items.len(),
            BatchOperation::Get(keys) => keys.len(),
            BatchOperation::Update(updates) => updates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_chunks(self) -> Vec<BatchOperation> {
        match self {
            BatchOperation::Write(items) => items
                .chunks(MAX_BATCH_ITEMS)
                .map(|c| BatchOperation::Write(c.to_vec()))
                .collect(),
            BatchOperation::Get(keys) => keys
                .chunks(MAX_BATCH_ITEMS)
                .map(|c| BatchOperation::Get(c.to_vec()))
                .collect(),
            BatchOperation::Update(updates) => updates
                .chunks(MAX_BATCH_ITEMS)
                .map(|c| BatchOperation::Update(c.to_vec()))
                .collect(),
        }
    }
}

/// Number of chunks an operation over `items` entries is split into.
pub fn chunk_count(items: usize) -> usize {
    items.div_ceil(MAX_BATCH_ITEMS)
}

/// Maximum chunks in flight per operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorLimits {
    /// Writes and updates
    pub write_concurrency: usize,
    pub read_concurrency: usize,
}

impl Default for ExecutorLimits {
    fn default() -> Self {
        Self {
            write_concurrency: 10,
            read_concurrency: 25,
        }
    }
}

/// A store call failed as a whole; the rest of the operation was abandoned.
#[derive(Error, Debug)]
#[error("{kind} batch failed with {remaining_chunks} of {total_chunks} chunks unresolved: {source}")]
pub struct ExecutionFailure {
    pub kind: &'static str,
    pub remaining_chunks: usize,
    pub total_chunks: usize,
    pub source: StoreError,
}

/// Issues chunked operations with bounded concurrency and merges the results.
#[derive(Clone)]
pub struct BatchExecutor {
    store: Arc<dyn KvStore>,
    limits: ExecutorLimits,
}

impl BatchExecutor {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_limits(store, ExecutorLimits::default())
    }

    pub fn with_limits(store: Arc<dyn KvStore>, limits: ExecutorLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Run `operation` to completion.
    ///
    /// Throttled entries come back in the result. The first chunk that fails
    /// at the transport level fails the whole call; nothing is retried.
    pub async fn execute(&self, operation: BatchOperation) -> Result<BatchResult, ExecutionFailure> {
        let kind = operation.kind();
        let concurrency = match operation {
            BatchOperation::Get(_) => self.limits.read_concurrency,
            BatchOperation::Write(_) | BatchOperation::Update(_) => self.limits.write_concurrency,
        }
        .max(1);

        let chunks = operation.into_chunks();
        let total_chunks = chunks.len();
        let mut merged = BatchResult::new();
        let mut completed = 0usize;

        let mut results = stream::iter(chunks)
            .map(|chunk| self.run_chunk(chunk))
            .buffer_unordered(concurrency);

        while let Some(result) = results.next().await {
            match result {
                Ok(chunk_result) => {
                    merged.merge(chunk_result);
                    completed += 1;
                }
                Err(source) => {
                    return Err(ExecutionFailure {
                        kind,
                        remaining_chunks: total_chunks - completed,
                        total_chunks,
                        source,
                    });
                }
            }
        }

        Ok(merged)
    }

    async fn run_chunk(&self, chunk: BatchOperation) -> Result<BatchResult, StoreError> {
        let mut result = BatchResult {
            chunks: 1,
            ..BatchResult::default()
        };

        match chunk {
            BatchOperation::Write(items) => {
                let outcome = self.store.batch_write(&items).await?;
                result.items_processed = (items.len() - outcome.unprocessed.len()) as u64;
                result.consumed_capacity_units = outcome.consumed_capacity;
                result.unprocessed_items = outcome.unprocessed;
            }
            BatchOperation::Get(keys) => {
                let outcome = self.store.batch_get(&keys).await?;
                result.items_processed = (keys.len() - outcome.unprocessed_keys.len()) as u64;
                result.items_returned = outcome.items.len() as u64;
                result.consumed_capacity_units = outcome.consumed_capacity;
                result.unprocessed_keys = outcome.unprocessed_keys;
            }
            BatchOperation::Update(updates) => {
                let outcomes = futures::future::join_all(
                    updates
                        .iter()
                        .map(|update| self.store.update(&update.key, &update.payload)),
                )
                .await;

                for outcome in outcomes {
                    let outcome = outcome?;
                    result.consumed_capacity_units += outcome.consumed_capacity;
                    if outcome.throttled {
                        result.throttled_operations += 1;
                    } else {
                        result.items_processed += 1;
                    }
                }
            }
        }

        Ok(result)
    }
}
