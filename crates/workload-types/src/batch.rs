//! Batch outcome type.

use crate::item::{Item, ItemKey};
use serde::{Deserialize, Serialize};

/// Outcome of one executed batch (or of one chunk of it).
///
/// Throttling is never an error here: items or keys the store could not
/// process within its capacity are returned in `unprocessed_items` /
/// `unprocessed_keys` next to whatever was consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Write items the store handed back unprocessed
    pub unprocessed_items: Vec<Item>,
    /// Read keys the store handed back unprocessed
    pub unprocessed_keys: Vec<ItemKey>,
    /// Single-item operations rejected by throttling (updates)
    pub throttled_operations: u64,
    /// Capacity units the store reported as consumed
    pub consumed_capacity_units: f64,
    /// Items returned by read operations
    pub items_returned: u64,
    /// Items (or keys) the store accepted and processed
    pub items_processed: u64,
    /// Number of chunks issued to produce this result
    pub chunks: u64,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds another chunk's outcome into this one.
    pub fn merge(&mut self, other: BatchResult) {
        self.unprocessed_items.extend(other.unprocessed_items);
        self.unprocessed_keys.extend(other.unprocessed_keys);
        self.throttled_operations += other.throttled_operations;
        self.consumed_capacity_units += other.consumed_capacity_units;
        self.items_returned += other.items_returned;
        self.items_processed += other.items_processed;
        self.chunks += other.chunks;
    }

    /// Total count of throttled entries, whatever their kind.
    pub fn throttled(&self) -> u64 {
        self.unprocessed_items.len() as u64
            + self.unprocessed_keys.len() as u64
            + self.throttled_operations
    }

    /// Processed plus unprocessed entries.
    pub fn accounted(&self) -> u64 {
        self.items_processed + self.throttled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_accumulates() {
        let mut total = BatchResult::new();
        total.merge(BatchResult {
            unprocessed_items: vec![Item::new("pk", "a", "p")],
            consumed_capacity_units: 24.0,
            items_processed: 24,
            chunks: 1,
            ..Default::default()
        });
        total.merge(BatchResult {
            unprocessed_keys: vec![ItemKey::new("pk", "b")],
            throttled_operations: 2,
            consumed_capacity_units: 1.5,
            items_returned: 3,
            items_processed: 3,
            chunks: 1,
            ..Default::default()
        });

        assert_eq!(total.chunks, 2);
        assert_eq!(total.items_processed, 27);
        assert_eq!(total.items_returned, 3);
        assert_eq!(total.consumed_capacity_units, 25.5);
        assert_eq!(total.throttled(), 4);
        assert_eq!(total.accounted(), 31);
    }
}
