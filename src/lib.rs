//! # abtest-pool
//!
//! In-process A/B pattern assignment. Each experiment resolves one pattern
//! (variant) through a host-supplied decision function, optionally persists it
//! so later runs see the same assignment, and dispatches registered handlers
//! only when their pattern restriction matches.
//!
//! - [`pool`] — key → handler storage
//! - [`controller`] — resolution / caching policy and dispatch
//! - [`store`] — persisted integer slot per save key (memory, SQLite, Redis)
//! - [`config`] — controller settings and the TOML experiments file
//! - [`decide`] — stock decision functions

pub mod cli;
pub mod config;
pub mod controller;
pub mod decide;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod pool;
pub mod store;

pub use config::{ControllerConfig, ExperimentsConfig};
pub use controller::ExperimentController;
pub use error::{AbTestError, ConfigError, StoreError};
pub use pattern::{CheckTiming, Pattern, TestKey};
pub use pool::{HandlerPool, Parameters, TestHandler};
pub use store::{InMemoryStore, PatternStore, SqliteStore};

#[cfg(feature = "redis-backing")]
pub use store::RedisPatternStore;
