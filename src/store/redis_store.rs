//! # Stage: Redis-Backed Pattern Store
//!
//! ## Responsibility
//! [`PatternStore`] over a Redis instance so that several processes on one
//! host (or one host restarting) read back the same resolved pattern. Each
//! save key becomes one Redis string key `<prefix><save_key>`.
//!
//! ## Guarantees
//! - Single-writer-wins: concurrent `SET`s from different processes are
//!   resolved by Redis itself, nothing stronger is promised
//! - Non-panicking: all Redis error paths are handled via `Result`
//! - Thread-safe: the connection sits behind a `Mutex`
//!
//! ## NOT Responsible For
//! - Cross-process critical sections around decide-then-persist
//! - Redis authentication / TLS (configure via the URL)

#![cfg(feature = "redis-backing")]

use std::sync::Mutex;

use super::PatternStore;
use crate::error::StoreError;

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "abtest:pattern:";

// ---------------------------------------------------------------------------
// RedisOps trait — abstraction for testability
// ---------------------------------------------------------------------------

/// The Redis commands needed by [`RedisPatternStore`].
/// Implemented by `redis::Connection` and `MockRedisOps` in tests.
pub(crate) trait RedisOps: Send {
    fn get(&mut self, key: &str) -> Result<Option<String>, String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), String>;
    fn del(&mut self, key: &str) -> Result<(), String>;
    fn ping(&mut self) -> Result<(), String>;
}

impl RedisOps for redis::Connection {
    fn get(&mut self, key: &str) -> Result<Option<String>, String> {
        redis::cmd("GET")
            .arg(key)
            .query::<Option<String>>(self)
            .map_err(|e| e.to_string())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query::<()>(self)
            .map_err(|e| e.to_string())
    }

    fn del(&mut self, key: &str) -> Result<(), String> {
        redis::cmd("DEL")
            .arg(key)
            .query::<()>(self)
            .map_err(|e| e.to_string())
    }

    fn ping(&mut self) -> Result<(), String> {
        redis::cmd("PING")
            .query::<String>(self)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// RedisPatternStore
// ---------------------------------------------------------------------------

/// Redis implementation of [`PatternStore`].
///
/// # Construction
/// - `connect(url, prefix)` opens a blocking connection and fails if Redis is
///   unreachable.
/// - `with_ops(ops, prefix)` injects any `RedisOps` (tests use a mock).
pub struct RedisPatternStore {
    ops: Mutex<Box<dyn RedisOps>>,
    prefix: String,
}

impl RedisPatternStore {
    /// Connect to Redis at `url`; keys are namespaced with `prefix`.
    ///
    /// Returns `Err` if the connection or initial PING fails.
    pub fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Redis(e.to_string()))?;
        let mut conn = client
            .get_connection()
            .map_err(|e| StoreError::Redis(format!("connection failed: {}", e)))?;
        conn.ping()
            .map_err(|e| StoreError::Redis(format!("ping failed: {}", e)))?;
        tracing::debug!(url, "connected to redis pattern store");
        Ok(Self::with_ops(Box::new(conn), prefix))
    }

    pub(crate) fn with_ops(ops: Box<dyn RedisOps>, prefix: impl Into<String>) -> Self {
        Self { ops: Mutex::new(ops), prefix: prefix.into() }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl PatternStore for RedisPatternStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let full = self.full_key(key);
        let raw = {
            let mut ops = self.ops.lock().map_err(|_| StoreError::LockPoisoned)?;
            ops.get(&full).map_err(StoreError::Redis)?
        };
        match raw {
            None => Ok(None),
            Some(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StoreError::Corrupt { key: full, value: s }),
        }
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let full = self.full_key(key);
        let mut ops = self.ops.lock().map_err(|_| StoreError::LockPoisoned)?;
        ops.set(&full, &value.to_string()).map_err(StoreError::Redis)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let full = self.full_key(key);
        let mut ops = self.ops.lock().map_err(|_| StoreError::LockPoisoned)?;
        ops.del(&full).map_err(StoreError::Redis)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
