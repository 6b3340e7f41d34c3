//! Lazy resharding of throttled writes.
//!
//! Items a hot partition could not absorb are moved to `<pk>#<n>` for a
//! randomly drawn shard `n` and written again, where `<pk>` is the partition
//! key the driver was configured with. Whatever the shard absorbed is
//! announced to the redistribution consumer; whatever it rejected marks the
//! shard as full and goes round again on a different shard. The loop is
//! bounded by the number of shard slots, so it always terminates.

use kv_store::{KvStore, StoreError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reshard_queue::{OutboxHandle, RedistributionMessage};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use workload_types::{
    Item, ItemKey, ShardNumber, ShardRange, DEFAULT_PARTITION_KEY, MAX_BATCH_ITEMS,
};

/// What one resharding pass achieved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReshardReport {
    /// Items durably written under some shard
    pub resharded: u64,
    /// Shard write attempts made
    pub attempts: u32,
    /// Shards that rejected at least one item
    pub full_shards: Vec<ShardNumber>,
    /// Notifications accepted by the outbox
    pub notifications: u64,
    pub consumed_capacity: f64,
    /// Items left unprocessed (only non-empty when resharding is disabled)
    pub skipped: Vec<Item>,
}

#[derive(Error, Debug)]
pub enum ReshardError {
    /// Every shard slot was observed full or the attempt bound was reached.
    #[error("resharding exhausted after {} attempts, {} items still unprocessed", report.attempts, remaining.len())]
    ResourceExhausted {
        remaining: Vec<Item>,
        report: ReshardReport,
    },

    /// A shard write failed at the transport level.
    #[error("shard write failed with {} items unresolved: {source}", remaining.len())]
    Store {
        source: StoreError,
        remaining: Vec<Item>,
        report: ReshardReport,
    },
}

impl ReshardError {
    pub fn remaining(&self) -> &[Item] {
        match self {
            ReshardError::ResourceExhausted { remaining, .. }
            | ReshardError::Store { remaining, .. } => remaining,
        }
    }

    pub fn report(&self) -> &ReshardReport {
        match self {
            ReshardError::ResourceExhausted { report, .. }
            | ReshardError::Store { report, .. } => report,
        }
    }
}

/// Reshards unprocessed writes for one driver.
pub struct ThrottleHandler {
    store: Arc<dyn KvStore>,
    outbox: Option<OutboxHandle>,
    partition_key: String,
    shards: ShardRange,
    max_attempts: u32,
    rng: StdRng,
}

impl ThrottleHandler {
    /// Without an outbox the handler only counts and logs unprocessed items.
    pub fn new(store: Arc<dyn KvStore>, outbox: Option<OutboxHandle>) -> Self {
        let shards = ShardRange::default();
        Self {
            store,
            outbox,
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            shards,
            max_attempts: shards.slots() as u32,
            rng: StdRng::from_entropy(),
        }
    }

    /// Draw shards from `shards`; the attempt bound follows the slot count.
    pub fn with_shards(mut self, shards: ShardRange) -> Self {
        self.shards = shards;
        self.max_attempts = shards.slots() as u32;
        self
    }

    /// Base partition key shard keys are built from.
    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = partition_key.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.outbox.is_some()
    }

    /// Relocate `items` until every one of them is written or resharding gives up.
    pub async fn handle(&mut self, items: Vec<Item>) -> Result<ReshardReport, ReshardError> {
        let mut report = ReshardReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        let Some(outbox) = self.outbox.clone() else {
            warn!(
                "{} unprocessed items, no redistribution queue configured, not resharding",
                items.len()
            );
            report.skipped = items;
            return Ok(report);
        };

        let mut pending = items;
        let mut full: HashSet<ShardNumber> = HashSet::new();

        while !pending.is_empty() {
            if report.attempts >= self.max_attempts {
                return Err(ReshardError::ResourceExhausted {
                    remaining: pending,
                    report,
                });
            }

            let Some(shard) = self.draw_shard(&full) else {
                return Err(ReshardError::ResourceExhausted {
                    remaining: pending,
                    report,
                });
            };
            report.attempts += 1;

            for item in &mut pending {
                item.move_to_shard(&self.partition_key, shard);
            }

            let mut rejected = Vec::new();
            for (index, chunk) in pending.chunks(MAX_BATCH_ITEMS).enumerate() {
                let outcome = match self.store.batch_write(chunk).await {
                    Ok(outcome) => outcome,
                    Err(source) => {
                        let mut remaining = rejected;
                        remaining.extend_from_slice(&pending[index * MAX_BATCH_ITEMS..]);
                        return Err(ReshardError::Store {
                            source,
                            remaining,
                            report,
                        });
                    }
                };
                report.consumed_capacity += outcome.consumed_capacity;

                let absorbed = absorbed_items(chunk, &outcome.unprocessed);
                if !absorbed.is_empty() {
                    report.resharded += absorbed.len() as u64;
                    if outbox.notify(RedistributionMessage::new(shard, absorbed)) {
                        report.notifications += 1;
                    }
                }
                rejected.extend(outcome.unprocessed);
            }

            if !rejected.is_empty() {
                info!("shard #{shard} FULL, trying new shard");
                full.insert(shard);
                report.full_shards.push(shard);
            }
            pending = rejected;
        }

        Ok(report)
    }

    fn draw_shard(&mut self, full: &HashSet<ShardNumber>) -> Option<ShardNumber> {
        let candidates: Vec<ShardNumber> =
            self.shards.iter().filter(|s| !full.contains(s)).collect();
        candidates.choose(&mut self.rng).copied()
    }
}

fn absorbed_items(chunk: &[Item], unprocessed: &[Item]) -> Vec<Item> {
    if unprocessed.is_empty() {
        return chunk.to_vec();
    }
    let rejected: HashSet<ItemKey> = unprocessed.iter().map(Item::key).collect();
    chunk
        .iter()
        .filter(|item| !rejected.contains(&item.key()))
        .cloned()
        .collect()
}
