//! In-process store backend.
//!
//! Behaves like a single DynamoDB table whose partitions can be made to
//! throttle on demand, so drivers and the resharding handler can be
//! exercised without AWS.

use crate::error::StoreError;
use crate::outcome::{GetOutcome, QueryOutcome, UpdateOutcome, WriteOutcome};
use crate::store::KvStore;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use workload_types::{Item, ItemKey, MAX_BATCH_ITEMS};

const WRITE_UNITS_PER_ITEM: f64 = 1.0;
const READ_UNITS_PER_ITEM: f64 = 0.5;

/// Call counters, useful for asserting request shapes in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStoreStats {
    pub batch_write_calls: u64,
    pub query_calls: u64,
    pub batch_get_calls: u64,
    pub update_calls: u64,
    /// Largest batch (write or get) seen in one call
    pub largest_batch: usize,
    /// Batch calls refused as a whole
    pub throttled_requests: u64,
}

#[derive(Debug, Default)]
struct State {
    partitions: BTreeMap<String, BTreeMap<String, String>>,
    saturated: HashSet<String>,
    partition_write_budget: Option<usize>,
    read_budget: Option<usize>,
    refuse_whole_requests: bool,
    pending_failures: u32,
    stats: MemoryStoreStats,
}

impl State {
    fn take_failure(&mut self, operation: &'static str) -> Result<(), StoreError> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(StoreError::request(operation, "injected failure"));
        }
        Ok(())
    }

    fn record_batch_size(&mut self, size: usize) {
        self.stats.largest_batch = self.stats.largest_batch.max(size);
    }

    /// A batch call that could process none of its `entries` is refused as a
    /// whole when whole-request refusals are on.
    fn refuse_if_untouched(
        &mut self,
        operation: &'static str,
        entries: usize,
        unprocessed: usize,
    ) -> Result<(), StoreError> {
        if self.refuse_whole_requests && entries > 0 && unprocessed == entries {
            self.stats.throttled_requests += 1;
            return Err(StoreError::Throttled { operation });
        }
        Ok(())
    }
}

/// In-memory [`KvStore`].
///
/// Throttling knobs:
/// - a per-call, per-partition write budget; writes past it come back unprocessed
/// - saturated partitions, which reject every write, get and update
/// - a per-call read budget for batch gets
///
/// By default a rejected entry simply comes back unprocessed. With
/// [`MemoryStore::with_whole_request_refusals`] a call that processes
/// nothing is refused outright, as DynamoDB does, and goes through the same
/// folding into an all-unprocessed outcome as the DynamoDB backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `items` writes per partition in a single batch call.
    pub fn with_partition_write_budget(self, items: usize) -> Self {
        self.lock().partition_write_budget = Some(items);
        self
    }

    /// Reject all traffic to `partition_key`.
    pub fn with_saturated_partition(self, partition_key: impl Into<String>) -> Self {
        self.saturate(partition_key);
        self
    }

    /// Process at most `keys` keys per batch get call.
    pub fn with_read_budget(self, keys: usize) -> Self {
        self.lock().read_budget = Some(keys);
        self
    }

    /// Refuse batch calls that can process none of their entries as a whole.
    pub fn with_whole_request_refusals(self) -> Self {
        self.lock().refuse_whole_requests = true;
        self
    }

    pub fn saturate(&self, partition_key: impl Into<String>) {
        self.lock().saturated.insert(partition_key.into());
    }

    /// Make the next `calls` store calls fail as a whole.
    pub fn fail_next(&self, calls: u32) {
        self.lock().pending_failures = calls;
    }

    /// Seed items directly, bypassing throttling and stats.
    pub fn insert_items(&self, items: impl IntoIterator<Item = Item>) {
        let mut state = self.lock();
        for item in items {
            state
                .partitions
                .entry(item.partition_key)
                .or_default()
                .insert(item.sort_key, item.payload);
        }
    }

    pub fn get(&self, key: &ItemKey) -> Option<Item> {
        let state = self.lock();
        state
            .partitions
            .get(&key.partition_key)
            .and_then(|partition| partition.get(&key.sort_key))
            .map(|payload| Item::new(&key.partition_key, &key.sort_key, payload))
    }

    pub fn item_count(&self) -> usize {
        self.lock().partitions.values().map(BTreeMap::len).sum()
    }

    pub fn partition_len(&self, partition_key: &str) -> usize {
        self.lock()
            .partitions
            .get(partition_key)
            .map_or(0, BTreeMap::len)
    }

    /// Partition keys that hold at least one item.
    pub fn partitions(&self) -> Vec<String> {
        self.lock()
            .partitions
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn stats(&self) -> MemoryStoreStats {
        self.lock().stats.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge the store for everyone else
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn check_batch_size(operation: &str, size: usize) -> Result<(), StoreError> {
    if size > MAX_BATCH_ITEMS {
        return Err(StoreError::InvalidRequest(format!(
            "{operation} accepts at most {MAX_BATCH_ITEMS} entries, got {size}"
        )));
    }
    Ok(())
}

fn read_units(items: usize) -> f64 {
    (items as f64 * READ_UNITS_PER_ITEM).max(READ_UNITS_PER_ITEM)
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn batch_write(&self, items: &[Item]) -> Result<WriteOutcome, StoreError> {
        check_batch_size("BatchWriteItem", items.len())?;
        let mut state = self.lock();
        state.stats.batch_write_calls += 1;
        state.record_batch_size(items.len());
        state.take_failure("BatchWriteItem")?;

        let mut accepted_per_partition: BTreeMap<&str, usize> = BTreeMap::new();
        let mut outcome = WriteOutcome::default();

        for item in items {
            let accepted = accepted_per_partition
                .entry(item.partition_key.as_str())
                .or_default();
            let over_budget = state
                .partition_write_budget
                .is_some_and(|budget| *accepted >= budget);

            if over_budget || state.saturated.contains(&item.partition_key) {
                outcome.unprocessed.push(item.clone());
                continue;
            }

            *accepted += 1;
            state
                .partitions
                .entry(item.partition_key.clone())
                .or_default()
                .insert(item.sort_key.clone(), item.payload.clone());
            outcome.consumed_capacity += WRITE_UNITS_PER_ITEM;
        }

        let result = state
            .refuse_if_untouched("BatchWriteItem", items.len(), outcome.unprocessed.len())
            .map(|()| outcome);
        drop(state);
        WriteOutcome::or_rejected(result, items)
    }

    async fn query(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        limit: usize,
    ) -> Result<QueryOutcome, StoreError> {
        let mut state = self.lock();
        state.stats.query_calls += 1;
        state.take_failure("Query")?;

        if limit == 0 {
            return Ok(QueryOutcome::default());
        }

        let items: Vec<Item> = state
            .partitions
            .get(partition_key)
            .map(|partition| {
                partition
                    .range(sort_key_prefix.to_string()..)
                    .take_while(|(sort_key, _)| sort_key.starts_with(sort_key_prefix))
                    .take(limit)
                    .map(|(sort_key, payload)| Item::new(partition_key, sort_key, payload))
                    .collect()
            })
            .unwrap_or_default();

        Ok(QueryOutcome {
            consumed_capacity: read_units(items.len()),
            items,
        })
    }

    async fn batch_get(&self, keys: &[ItemKey]) -> Result<GetOutcome, StoreError> {
        check_batch_size("BatchGetItem", keys.len())?;
        let mut state = self.lock();
        state.stats.batch_get_calls += 1;
        state.record_batch_size(keys.len());
        state.take_failure("BatchGetItem")?;

        let mut outcome = GetOutcome::default();
        let mut processed = 0usize;

        for key in keys {
            let over_budget = state.read_budget.is_some_and(|budget| processed >= budget);
            if over_budget || state.saturated.contains(&key.partition_key) {
                outcome.unprocessed_keys.push(key.clone());
                continue;
            }

            processed += 1;
            if let Some(payload) = state
                .partitions
                .get(&key.partition_key)
                .and_then(|partition| partition.get(&key.sort_key))
            {
                outcome.items.push(Item::new(
                    key.partition_key.clone(),
                    key.sort_key.clone(),
                    payload.clone(),
                ));
            }
        }

        if processed > 0 {
            outcome.consumed_capacity = read_units(processed);
        }

        let result = state
            .refuse_if_untouched("BatchGetItem", keys.len(), outcome.unprocessed_keys.len())
            .map(|()| outcome);
        drop(state);
        GetOutcome::or_rejected(result, keys)
    }

    async fn update(&self, key: &ItemKey, payload: &str) -> Result<UpdateOutcome, StoreError> {
        let mut state = self.lock();
        state.stats.update_calls += 1;
        state.take_failure("UpdateItem")?;

        if state.saturated.contains(&key.partition_key) {
            return Ok(UpdateOutcome::throttled());
        }

        // UpdateItem upserts, and so do we
        state
            .partitions
            .entry(key.partition_key.clone())
            .or_default()
            .insert(key.sort_key.clone(), payload.to_string());
        Ok(UpdateOutcome::applied(WRITE_UNITS_PER_ITEM))
    }
}
