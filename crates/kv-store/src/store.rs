//! Trait definition for store backends.

use crate::error::StoreError;
use crate::outcome::{GetOutcome, QueryOutcome, UpdateOutcome, WriteOutcome};
use workload_types::{Item, ItemKey};

/// Operations the load generator issues against the store.
///
/// This trait abstracts over the backend so the same executor and resharding
/// logic runs against DynamoDB and the in-memory store.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Write up to 25 items in one request.
    ///
    /// Items the store could not absorb are returned in
    /// [`WriteOutcome::unprocessed`], including when the request was
    /// throttled as a whole.
    async fn batch_write(&self, items: &[Item]) -> Result<WriteOutcome, StoreError>;

    /// Return up to `limit` items of `partition_key` whose sort key starts
    /// with `sort_key_prefix`.
    async fn query(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
        limit: usize,
    ) -> Result<QueryOutcome, StoreError>;

    /// Fetch up to 25 items by key in one request.
    ///
    /// Keys left unread, including by a whole-request throttle, are returned
    /// in [`GetOutcome::unprocessed_keys`].
    async fn batch_get(&self, keys: &[ItemKey]) -> Result<GetOutcome, StoreError>;

    /// Unconditionally overwrite the payload of one item.
    async fn update(&self, key: &ItemKey, payload: &str) -> Result<UpdateOutcome, StoreError>;
}
