//! Item generator producing insert payloads.

use crate::generators::prefix::random_prefix;
use crate::generators::uuid::generate_uuid_v4;
use rand::rngs::StdRng;
use rand::SeedableRng;
use workload_types::Item;

/// Generator that synthesizes new items for one partition.
///
/// With a fixed seed the produced sequence is reproducible, which keeps
/// tests deterministic. Workers in production use [`ItemGenerator::from_entropy`].
pub struct ItemGenerator {
    /// Partition every generated item is written to
    partition_key: String,
    /// Random number generator for prefixes, sort keys and payloads
    rng: StdRng,
    /// Number of items generated so far
    generated: u64,
}

impl ItemGenerator {
    /// Create a new generator with the given partition key and seed.
    pub fn new(partition_key: impl Into<String>, seed: u64) -> Self {
        Self {
            partition_key: partition_key.into(),
            rng: StdRng::seed_from_u64(seed),
            generated: 0,
        }
    }

    /// Create a generator seeded from OS entropy.
    pub fn from_entropy(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            rng: StdRng::from_entropy(),
            generated: 0,
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Number of items generated so far.
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Generate the next item.
    pub fn next_item(&mut self) -> Item {
        let prefix = random_prefix(&mut self.rng);
        let sort_key = format!("{prefix}#{}", generate_uuid_v4(&mut self.rng));
        let payload = generate_uuid_v4(&mut self.rng).to_string();
        self.generated += 1;
        Item::new(self.partition_key.clone(), sort_key, payload)
    }

    /// A fresh payload, as used when overwriting existing items.
    pub fn next_payload(&mut self) -> String {
        generate_uuid_v4(&mut self.rng).to_string()
    }

    /// Generate `count` new items.
    pub fn items(&mut self, count: u64) -> Vec<Item> {
        (0..count).map(|_| self.next_item()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_single_item() {
        let mut generator = ItemGenerator::new("SinglePK", 42);
        let item = generator.next_item();

        assert_eq!(item.partition_key, "SinglePK");
        let (prefix, suffix) = item.sort_key.split_once('#').unwrap();
        assert_eq!(prefix.len(), 1);
        assert_eq!(suffix.len(), 36);
        assert_eq!(item.payload.len(), 36);
        assert_eq!(generator.generated(), 1);
    }

    #[test]
    fn test_deterministic_with_same_seed() {
        let mut a = ItemGenerator::new("pk", 42);
        let mut b = ItemGenerator::new("pk", 42);
        assert_eq!(a.items(10), b.items(10));
    }

    #[test]
    fn test_sort_keys_are_unique() {
        let mut generator = ItemGenerator::new("pk", 1);
        let items = generator.items(500);
        let keys: HashSet<_> = items.iter().map(|i| i.sort_key.clone()).collect();
        assert_eq!(keys.len(), 500);
    }

    #[test]
    fn test_zero_items() {
        let mut generator = ItemGenerator::from_entropy("pk");
        assert!(generator.items(0).is_empty());
    }
}
