//! Shard naming convention.
//!
//! A shard is not a stored entity. It only exists as the partition key
//! `<base>#<n>`, which the redistribution consumer knows how to fold back
//! into the base partition. The base is whatever partition key the worker
//! was configured with, so it may itself end in `#<digits>`; shard keys are
//! always built from that configured base, never parsed out of a key.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Separator between a base partition key and its shard number.
pub const SHARD_SEPARATOR: char = '#';

/// Number of a shard partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardNumber(u32);

impl ShardNumber {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Builds the sharded partition key for `base`.
    pub fn apply(self, base: &str) -> String {
        format!("{base}{SHARD_SEPARATOR}{}", self.0)
    }
}

impl std::fmt::Display for ShardNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range shard numbers are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRange {
    pub min: u32,
    pub max: u32,
}

impl Default for ShardRange {
    fn default() -> Self {
        Self { min: 1, max: 19 }
    }
}

impl ShardRange {
    pub fn new(min: u32, max: u32) -> Result<Self, ConfigError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min == 0 {
            return Err(ConfigError::invalid("shard_range.min", "must be >= 1"));
        }
        if self.min > self.max {
            return Err(ConfigError::invalid(
                "shard_range",
                format!("min {} is greater than max {}", self.min, self.max),
            ));
        }
        Ok(())
    }

    /// Number of shard slots in the range.
    pub fn slots(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    pub fn contains(&self, shard: ShardNumber) -> bool {
        (self.min..=self.max).contains(&shard.get())
    }

    pub fn iter(&self) -> impl Iterator<Item = ShardNumber> {
        (self.min..=self.max).map(ShardNumber::new)
    }
}
