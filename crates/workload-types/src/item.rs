//! Items and item keys.

use crate::shard::ShardNumber;
use serde::{Deserialize, Serialize};

/// Partition key used by every worker unless overridden.
///
/// All workers write to a single partition on purpose: it is the hot key
/// that the load test tries to throttle.
pub const DEFAULT_PARTITION_KEY: &str = "SinglePK";

/// Composite primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl ItemKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.sort_key)
    }
}

/// A record stored under `(partition_key, sort_key)` with an opaque payload.
///
/// Serializes as `{"partitionKey", "sortKey", "payload"}`, which is also the
/// shape the redistribution consumer receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub partition_key: String,
    pub sort_key: String,
    pub payload: String,
}

impl Item {
    pub fn new(
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            payload: payload.into(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.partition_key.clone(), self.sort_key.clone())
    }

    /// Moves this item to `shard` of the configured partition `base`.
    ///
    /// The key is rebuilt from `base` rather than from the current key, so
    /// moving an item again replaces its shard instead of stacking suffixes.
    pub fn move_to_shard(&mut self, base: &str, shard: ShardNumber) {
        self.partition_key = shard.apply(base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_serializes_with_camel_case_fields() {
        let item = Item::new("SinglePK", "a#123", "payload");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["partitionKey"], "SinglePK");
        assert_eq!(json["sortKey"], "a#123");
        assert_eq!(json["payload"], "payload");
    }

    #[test]
    fn test_move_to_shard_rebuilds_from_base() {
        let mut item = Item::new("SinglePK", "a#1", "p");
        item.move_to_shard("SinglePK", ShardNumber::new(3));
        assert_eq!(item.partition_key, "SinglePK#3");

        item.move_to_shard("SinglePK", ShardNumber::new(11));
        assert_eq!(item.partition_key, "SinglePK#11");
        assert_eq!(item.sort_key, "a#1");
    }

    #[test]
    fn test_move_to_shard_keeps_numeric_suffix_of_base() {
        let mut item = Item::new("Tenant#2024", "a#1", "p");
        item.move_to_shard("Tenant#2024", ShardNumber::new(5));
        assert_eq!(item.partition_key, "Tenant#2024#5");

        item.move_to_shard("Tenant#2024", ShardNumber::new(9));
        assert_eq!(item.partition_key, "Tenant#2024#9");
    }
}
