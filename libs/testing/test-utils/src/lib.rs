//! Shared test utilities for the task store
//!
//! - `TestDatabase`: migrated PostgreSQL container with automatic cleanup (feature: "postgres")
//! - `TestDataBuilder`: deterministic per-test owners (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let data = TestDataBuilder::from_test_name("my_postgres_test");
//!
//!     let owner = data.owner_id("alice");
//! }
//! ```

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Deterministic test data, seeded from the test name.
///
/// Two builders with the same seed produce the same owners, so a failing test
/// is reproducible, while different tests never share an owner.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from a hash of the test name
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let data = TestDataBuilder::from_test_name("test_reorder_down");
    /// assert_eq!(data.owner_id("a"), TestDataBuilder::from_test_name("test_reorder_down").owner_id("a"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        Self::new(hash_of(name))
    }

    /// Owner id for `label`, stable for this seed
    pub fn owner_id(&self, label: &str) -> Uuid {
        let high = self.seed;
        let low = hash_of(label) ^ self.seed.rotate_left(17);
        Uuid::from_u64_pair(high, low)
    }
}

fn hash_of(value: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
