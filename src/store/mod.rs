//! # Module: store
//!
//! Persisted key-value slot holding the resolved pattern for each save key.
//!
//! ## Sub-modules
//! - [`sqlite`] — durable on-disk store (rusqlite)
//! - `redis_store` — shared Redis store, behind the `redis-backing` feature

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

pub mod sqlite;

#[cfg(feature = "redis-backing")]
pub mod redis_store;

pub use sqlite::SqliteStore;

#[cfg(feature = "redis-backing")]
pub use redis_store::RedisPatternStore;

// ---------------------------------------------------------------------------
// PatternStore trait
// ---------------------------------------------------------------------------

/// Integer key-value store used to persist resolved patterns.
///
/// Implementations use interior mutability so one store can be shared as
/// `Arc<dyn PatternStore>` by every controller that uses the same save key.
/// Each call is a single synchronous local operation.
pub trait PatternStore: Send + Sync {
    /// Value under `key`, or `None` if nothing was ever stored.
    fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Store `value` under `key`, overwriting any previous value.
    fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Process-lifetime store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PatternStore for InMemoryStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(values.get(key).copied())
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        values.remove(key);
        Ok(())
    }
}
