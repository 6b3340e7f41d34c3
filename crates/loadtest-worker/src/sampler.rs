//! Sampling existing keys for read and update workloads.

use kv_store::{KvStore, StoreError};
use loadtest_generator::SORT_KEY_ALPHABET;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use workload_types::ItemKey;

/// Upper bound on prefix queries for one sample.
///
/// One pass over the alphabet; an empty or tiny partition costs at most this
/// many queries instead of spinning.
pub const DEFAULT_MAX_QUERIES: usize = SORT_KEY_ALPHABET.len();

/// Keys drawn from the partition plus what drawing them cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub keys: Vec<ItemKey>,
    pub queries: usize,
    pub consumed_capacity: f64,
}

/// Samples pseudo-random items of one partition with `begins_with` queries
/// on random sort key prefixes.
pub struct KeySampler {
    partition_key: String,
    max_queries: usize,
    rng: StdRng,
    pool: Vec<ItemKey>,
}

impl KeySampler {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            max_queries: DEFAULT_MAX_QUERIES,
            rng: StdRng::from_entropy(),
            pool: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = max_queries.max(1);
        self
    }

    /// Draw up to `count` distinct keys. Fewer come back when the partition
    /// is smaller than `count` or the query bound is hit.
    pub async fn sample(&mut self, store: &dyn KvStore, count: usize) -> Result<Sample, StoreError> {
        let mut sample = Sample::default();
        if count == 0 {
            return Ok(sample);
        }

        let mut prefixes: Vec<u8> = SORT_KEY_ALPHABET.to_vec();
        prefixes.shuffle(&mut self.rng);

        let mut seen: HashSet<ItemKey> = HashSet::new();
        for prefix in prefixes.into_iter().take(self.max_queries) {
            let wanted = count - sample.keys.len();
            let prefix = (prefix as char).to_string();
            let outcome = store.query(&self.partition_key, &prefix, wanted).await?;

            sample.queries += 1;
            sample.consumed_capacity += outcome.consumed_capacity;
            for item in outcome.items {
                let key = item.key();
                if seen.insert(key.clone()) {
                    sample.keys.push(key);
                }
            }

            if sample.keys.len() >= count {
                sample.keys.truncate(count);
                break;
            }
        }

        Ok(sample)
    }

    /// Like [`KeySampler::sample`], but keys are picked once and reused.
    ///
    /// The pool is only topped up when `count` outgrows it, so a constant
    /// load keeps hitting the same items.
    pub async fn sample_pooled(
        &mut self,
        store: &dyn KvStore,
        count: usize,
    ) -> Result<Sample, StoreError> {
        let mut sample = Sample::default();

        if count > self.pool.len() {
            let fresh = self.sample(store, count).await?;
            sample.queries = fresh.queries;
            sample.consumed_capacity = fresh.consumed_capacity;

            let known: HashSet<ItemKey> = self.pool.iter().cloned().collect();
            self.pool
                .extend(fresh.keys.into_iter().filter(|key| !known.contains(key)));
        }

        sample.keys = self.pool.iter().take(count).cloned().collect();
        Ok(sample)
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::MemoryStore;
    use loadtest_generator::ItemGenerator;

    fn seeded_store(count: u64) -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_items(ItemGenerator::new("SinglePK", 99).items(count));
        store
    }

    #[tokio::test]
    async fn test_sample_returns_distinct_keys() {
        let store = seeded_store(500);
        let mut sampler = KeySampler::new("SinglePK").with_seed(1);

        let sample = sampler.sample(&store, 120).await.unwrap();

        assert_eq!(sample.keys.len(), 120);
        let distinct: HashSet<_> = sample.keys.iter().collect();
        assert_eq!(distinct.len(), 120);
        assert!(sample.keys.iter().all(|k| k.partition_key == "SinglePK"));
        assert!(sample.consumed_capacity > 0.0);
    }

    #[tokio::test]
    async fn test_sample_on_empty_partition_is_bounded() {
        let store = MemoryStore::new();
        let mut sampler = KeySampler::new("SinglePK").with_seed(2);

        let sample = sampler.sample(&store, 50).await.unwrap();

        assert!(sample.keys.is_empty());
        assert_eq!(sample.queries, DEFAULT_MAX_QUERIES);
        assert_eq!(store.stats().query_calls as usize, DEFAULT_MAX_QUERIES);
    }

    #[tokio::test]
    async fn test_sample_returns_everything_from_small_partition() {
        let store = seeded_store(20);
        let mut sampler = KeySampler::new("SinglePK").with_seed(3);

        let sample = sampler.sample(&store, 100).await.unwrap();
        assert_eq!(sample.keys.len(), 20);
    }

    #[tokio::test]
    async fn test_pooled_sample_is_reused_until_load_grows() {
        let store = seeded_store(500);
        let mut sampler = KeySampler::new("SinglePK").with_seed(4);

        let first = sampler.sample_pooled(&store, 30).await.unwrap();
        let queries_after_first = store.stats().query_calls;
        let second = sampler.sample_pooled(&store, 30).await.unwrap();

        assert_eq!(first.keys, second.keys);
        assert_eq!(second.queries, 0);
        assert_eq!(store.stats().query_calls, queries_after_first);

        let grown = sampler.sample_pooled(&store, 45).await.unwrap();
        assert_eq!(grown.keys.len(), 45);
        assert_eq!(&grown.keys[..30], &first.keys[..]);
        assert!(sampler.pool_len() >= 45);
    }
}
