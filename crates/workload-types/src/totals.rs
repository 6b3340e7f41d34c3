//! Per-driver running totals.

use crate::batch::BatchResult;
use crate::config::WorkloadRole;
use serde::{Deserialize, Serialize};

/// Counters owned by exactly one driver.
///
/// Every field only ever grows during the driver's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningTotals {
    /// Items, keys or operations the store throttled
    pub throttled_count: u64,
    /// Capacity units consumed, including sampling and resharding
    pub consumed_capacity: f64,
    /// Items returned by reads
    pub items_read: u64,
    /// Items durably written (insert role, including resharded ones)
    pub items_written: u64,
    /// Items successfully updated
    pub items_updated: u64,
    /// Items relocated to a shard partition
    pub resharded_items: u64,
    /// Items still unprocessed after resharding gave up
    pub unresolved_items: u64,
    /// Iterations whose operation failed at the transport level
    pub failed_iterations: u64,
    /// Redistribution notifications handed to the outbox
    pub notifications_queued: u64,
}

impl RunningTotals {
    /// Folds one iteration's batch outcome in.
    pub fn record_batch(&mut self, role: WorkloadRole, result: &BatchResult) {
        self.throttled_count += result.throttled();
        self.consumed_capacity += result.consumed_capacity_units;
        match role {
            WorkloadRole::Insert => self.items_written += result.items_processed,
            WorkloadRole::Read => self.items_read += result.items_returned,
            WorkloadRole::Update => self.items_updated += result.items_processed,
        }
    }

    /// Capacity consumed outside the main batch (sampling queries, shard writes).
    pub fn record_capacity(&mut self, units: f64) {
        self.consumed_capacity += units;
    }

    pub fn record_failure(&mut self) {
        self.failed_iterations += 1;
    }
}
