//! Crate-level error types.
//!
//! Contract violations by the host (using the pool before `install`, executing
//! an unregistered key) and data-integrity failures (a persisted value that no
//! longer decodes) are all surfaced as typed errors. Nothing in this crate
//! retries; the host decides whether an error is fatal.

use thiserror::Error;

// ---------------------------------------------------------------------------
// AbTestError
// ---------------------------------------------------------------------------

/// Errors produced by [`ExperimentController`](crate::controller::ExperimentController).
#[derive(Debug, Error)]
pub enum AbTestError {
    /// A pool operation ran before `install()` was ever called.
    #[error("test pool is not installed; call install() when the experiment is constructed")]
    NotInstalled,

    /// `execute` was called for a key that has no registered handler.
    #[error("test is not registered: key = {key}, registered = {registered:?}")]
    UnregisteredKey {
        /// The key passed to `execute`.
        key: String,
        /// Keys present in the pool at the time of the call.
        registered: Vec<String>,
    },

    /// The persisted value does not map to any known pattern.
    #[error("persisted value {raw} under '{save_key}' does not decode to a known pattern")]
    UndecodablePattern {
        /// Store key that held the value.
        save_key: String,
        /// The raw integer found in the store.
        raw: i64,
    },

    /// The underlying pattern store failed.
    #[error("pattern store error: {0}")]
    Store(#[from] StoreError),

    /// An internal lock was poisoned by a panicking handler or decision function.
    #[error("experiment controller lock poisoned")]
    LockPoisoned,
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors produced by [`PatternStore`](crate::store::PatternStore) backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("redis: {0}")]
    Redis(String),

    /// A value exists under `key` but is not an integer.
    #[error("value under '{key}' is not an integer: {value:?}")]
    Corrupt { key: String, value: String },

    #[error("pattern store lock poisoned")]
    LockPoisoned,
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while loading [`ExperimentsConfig`](crate::config::ExperimentsConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid experiments config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An experiment section set `save_key = ""`.
    #[error("experiment '{0}' has an empty save_key")]
    EmptySaveKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_key_message_names_key() {
        let err = AbTestError::UnregisteredKey {
            key: "TestCase1".into(),
            registered: vec!["TestCase2".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("TestCase1"), "msg={}", msg);
        assert!(msg.contains("TestCase2"), "msg={}", msg);
    }

    #[test]
    fn test_undecodable_message_names_save_key_and_raw() {
        let err = AbTestError::UndecodablePattern { save_key: "XPattern".into(), raw: 42 };
        let msg = err.to_string();
        assert!(msg.contains("XPattern"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_store_error_converts_into_abtest_error() {
        let err: AbTestError = StoreError::Redis("connection reset".into()).into();
        assert!(matches!(err, AbTestError::Store(StoreError::Redis(_))));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_not_installed_mentions_install() {
        assert!(AbTestError::NotInstalled.to_string().contains("install()"));
    }
}
