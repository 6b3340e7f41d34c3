//! Item generator for the lazy-shard load testing framework.
//!
//! This crate provides the [`ItemGenerator`] which synthesizes the items the
//! insert workers write. Every item lands in the same (hot) partition and
//! gets a sort key of the form `<c>#<uuid>`, where `<c>` is one random
//! base-36 character:
//!
//! ```text
//! PK = SinglePK
//! SK = 7#1c0e3b6e-6a1d-4f4e-9a55-1f0d2c8b7e21
//! Payload = 5b0f...
//! ```
//!
//! Because the leading character is uniformly distributed, a
//! `begins_with(SK, <c>)` query returns a pseudo-random slice of the
//! partition, which is how readers and updaters sample existing items.
//!
//! # Example
//!
//! ```rust
//! use loadtest_generator::ItemGenerator;
//!
//! let mut generator = ItemGenerator::new("SinglePK", 42);
//! let items = generator.items(25);
//! assert_eq!(items.len(), 25);
//! assert!(items.iter().all(|i| i.partition_key == "SinglePK"));
//! ```

pub mod generator;
pub mod generators;

// Re-exports for convenience
pub use generator::ItemGenerator;
pub use generators::prefix::{random_prefix, SORT_KEY_ALPHABET};
pub use generators::uuid::generate_uuid_v4;
