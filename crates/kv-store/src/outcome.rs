//! Per-call outcome types.

use crate::error::StoreError;
use workload_types::{Item, ItemKey};

/// Outcome of a batch write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    /// Items the store did not write because of throttling
    pub unprocessed: Vec<Item>,
    pub consumed_capacity: f64,
}

impl WriteOutcome {
    /// Nothing written: every one of `items` comes back unprocessed.
    pub fn rejected(items: &[Item]) -> Self {
        Self {
            unprocessed: items.to_vec(),
            consumed_capacity: 0.0,
        }
    }

    /// Turn a whole-request throttle for `items` into an all-unprocessed outcome.
    pub fn or_rejected(
        result: Result<Self, StoreError>,
        items: &[Item],
    ) -> Result<Self, StoreError> {
        match result {
            Err(StoreError::Throttled { operation }) => {
                tracing::debug!("{operation} throttled, {} items unprocessed", items.len());
                Ok(Self::rejected(items))
            }
            other => other,
        }
    }
}

/// Outcome of a prefix query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub items: Vec<Item>,
    pub consumed_capacity: f64,
}

/// Outcome of a batch get.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOutcome {
    /// Items found; keys that do not exist are simply absent
    pub items: Vec<Item>,
    /// Keys the store did not read because of throttling
    pub unprocessed_keys: Vec<ItemKey>,
    pub consumed_capacity: f64,
}

impl GetOutcome {
    /// Nothing read: every one of `keys` comes back unprocessed.
    pub fn rejected(keys: &[ItemKey]) -> Self {
        Self {
            items: Vec::new(),
            unprocessed_keys: keys.to_vec(),
            consumed_capacity: 0.0,
        }
    }

    /// Turn a whole-request throttle for `keys` into an all-unprocessed outcome.
    pub fn or_rejected(
        result: Result<Self, StoreError>,
        keys: &[ItemKey],
    ) -> Result<Self, StoreError> {
        match result {
            Err(StoreError::Throttled { operation }) => {
                tracing::debug!("{operation} throttled, {} keys unprocessed", keys.len());
                Ok(Self::rejected(keys))
            }
            other => other,
        }
    }
}

/// Outcome of a single-item update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub consumed_capacity: f64,
    /// The store rejected the update for lack of capacity
    pub throttled: bool,
}

impl UpdateOutcome {
    pub fn applied(consumed_capacity: f64) -> Self {
        Self {
            consumed_capacity,
            throttled: false,
        }
    }

    pub fn throttled() -> Self {
        Self {
            consumed_capacity: 0.0,
            throttled: true,
        }
    }
}
