//! # Stage: Experiment Controller
//!
//! ## Responsibility
//! Owns one experiment's pattern-resolution policy and its handler pool.
//! The host composes an [`ExperimentController`] into its own experiment type,
//! supplying the decision function, the save key and the [`CheckTiming`].
//!
//! ## Guarantees
//! - `Once`: the first resolution for a save key decides and persists; every
//!   later resolution (other instances and restarts included) reads the
//!   persisted value until `reset_pattern`
//! - `Once`: read-decide-persist runs inside a per-save-key critical section,
//!   so concurrent first resolutions in one process agree on a single winner
//! - `EveryTime`: every resolution calls the decision function; nothing is persisted
//! - `execute` resolves the pattern once per call and reuses it for the
//!   restriction check and the handler
//! - Handlers run with no controller lock held, so they may call back in
//!
//! ## NOT Responsible For
//! - Cross-process coordination (the store's own atomicity is all there is)
//! - Choosing patterns (the host's decision function does)

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::config::ControllerConfig;
use crate::error::AbTestError;
use crate::pattern::{CheckTiming, Pattern, TestKey};
use crate::pool::{HandlerPool, Parameters, TestHandler};
use crate::store::PatternStore;

// ---------------------------------------------------------------------------
// Per-save-key critical sections
// ---------------------------------------------------------------------------

/// One lock per save key, shared by every controller in the process.
static SAVE_KEY_LOCKS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn save_key_lock(save_key: &str) -> Arc<Mutex<()>> {
    let mut locks = SAVE_KEY_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(save_key.to_string()).or_default())
}

// ---------------------------------------------------------------------------
// ExperimentController
// ---------------------------------------------------------------------------

type DecideFn<P> = dyn Fn() -> P + Send + Sync;

/// Pattern resolution plus pattern-filtered dispatch for one experiment.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use abtest_pool::{decide, impl_pattern, CheckTiming, ControllerConfig,
///                   ExperimentController, InMemoryStore};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Color { Red, Blue }
/// impl_pattern!(Color { Red = 0, Blue = 1 });
///
/// let store = Arc::new(InMemoryStore::new());
/// let ctl: ExperimentController<&str, Color> = ExperimentController::new(
///     ControllerConfig::new("ColorPattern", CheckTiming::Once),
///     store,
///     decide::fixed(Color::Blue),
/// );
/// ctl.install().unwrap();
/// ctl.add_test("banner", |c| assert_eq!(c, Color::Blue)).unwrap();
/// ctl.execute("banner").unwrap();
/// ```
pub struct ExperimentController<K, P: Pattern> {
    config: ControllerConfig,
    decide: Box<DecideFn<P>>,
    store: Arc<dyn PatternStore>,
    /// `None` until `install()`.
    pool: Mutex<Option<HandlerPool<P>>>,
    _key: PhantomData<fn(K)>,
}

impl<K: TestKey, P: Pattern> ExperimentController<K, P> {
    /// Create an uninstalled controller. Call [`install`](Self::install)
    /// before registering or executing tests.
    pub fn new<F>(config: ControllerConfig, store: Arc<dyn PatternStore>, decide: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            config,
            decide: Box::new(decide),
            store,
            pool: Mutex::new(None),
            _key: PhantomData,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Bind a fresh empty pool, then resolve the pattern immediately so that
    /// any persistence happens now rather than on first `execute`.
    ///
    /// Returns the resolved pattern.
    pub fn install(&self) -> Result<P, AbTestError> {
        {
            let mut pool = self.pool.lock().map_err(|_| AbTestError::LockPoisoned)?;
            *pool = Some(HandlerPool::new());
        }
        let pattern = self.pattern()?;
        debug!(
            save_key = %self.config.save_key,
            timing = %self.config.check_timing,
            ?pattern,
            "test pool installed"
        );
        Ok(pattern)
    }

    /// Drop every registered handler. The persisted pattern is left alone.
    pub fn uninstall(&self) -> Result<(), AbTestError> {
        let dropped = self.with_pool(|pool| {
            let n = pool.count();
            pool.clear();
            n
        })?;
        debug!(save_key = %self.config.save_key, dropped, "test pool uninstalled");
        Ok(())
    }

    /// Forget the persisted pattern for this save key and install again,
    /// which decides (and under `Once`, persists) a fresh pattern.
    pub fn reset_pattern(&self) -> Result<P, AbTestError> {
        {
            let lock = save_key_lock(&self.config.save_key);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.store.remove(&self.config.save_key)?;
        }
        debug!(save_key = %self.config.save_key, "persisted pattern reset");
        self.install()
    }

    pub fn is_installed(&self) -> bool {
        self.pool.lock().map(|p| p.is_some()).unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Pattern resolution
    // -----------------------------------------------------------------------

    /// The current pattern.
    ///
    /// Under `Once`, returns the persisted value if there is one, otherwise
    /// decides, persists and returns. Under `EveryTime`, always decides and
    /// never persists.
    ///
    /// # Errors
    /// [`AbTestError::UndecodablePattern`] if the persisted value is not a
    /// known pattern, [`AbTestError::Store`] if the store fails.
    pub fn pattern(&self) -> Result<P, AbTestError> {
        match self.config.check_timing {
            CheckTiming::EveryTime => {
                let pattern = (self.decide)();
                trace!(save_key = %self.config.save_key, ?pattern, "pattern decided (every time)");
                Ok(pattern)
            }
            CheckTiming::Once => {
                let save_key = self.config.save_key.as_str();
                let lock = save_key_lock(save_key);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

                if let Some(raw) = self.store.get_int(save_key)? {
                    return match P::from_raw(raw) {
                        Some(pattern) => {
                            trace!(save_key, ?pattern, "pattern loaded");
                            Ok(pattern)
                        }
                        None => {
                            warn!(save_key, raw, "persisted pattern does not decode");
                            Err(AbTestError::UndecodablePattern {
                                save_key: save_key.to_string(),
                                raw,
                            })
                        }
                    };
                }

                let pattern = (self.decide)();
                self.store.set_int(save_key, pattern.to_raw())?;
                debug!(save_key, ?pattern, raw = pattern.to_raw(), "pattern decided and persisted");
                Ok(pattern)
            }
        }
    }

    /// Whether the store currently holds a value for this save key.
    pub fn has_persisted_pattern(&self) -> Result<bool, AbTestError> {
        Ok(self.store.get_int(&self.config.save_key)?.is_some())
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Store `handler` under `key`, replacing any previous handler.
    pub fn register(&self, key: K, handler: TestHandler<P>) -> Result<(), AbTestError> {
        let key = key.as_key().to_string();
        self.with_pool(|pool| {
            trace!(key = %key, parameterized = handler.is_parameterized(), "test registered");
            pool.add(key, handler);
        })
    }

    pub fn add_test<F>(&self, key: K, handler: F) -> Result<(), AbTestError>
    where
        F: Fn(P) + Send + Sync + 'static,
    {
        self.register(key, TestHandler::simple(handler))
    }

    pub fn add_test_with_parameters<F>(&self, key: K, handler: F) -> Result<(), AbTestError>
    where
        F: Fn(P, Option<&Parameters>) + Send + Sync + 'static,
    {
        self.register(key, TestHandler::parameterized(handler))
    }

    /// Like [`add_test`](Self::add_test), but the handler is skipped unless the
    /// resolved pattern is one of `targets`. No targets means no restriction.
    pub fn add_test_only<I, F>(&self, key: K, targets: I, handler: F) -> Result<(), AbTestError>
    where
        I: IntoIterator<Item = P>,
        F: Fn(P) + Send + Sync + 'static,
    {
        let targets: Vec<P> = targets.into_iter().collect();
        self.register(key, TestHandler::simple(handler).restrict(targets))
    }

    /// Parameterized counterpart of [`add_test_only`](Self::add_test_only).
    pub fn add_test_with_parameters_only<I, F>(
        &self,
        key: K,
        targets: I,
        handler: F,
    ) -> Result<(), AbTestError>
    where
        I: IntoIterator<Item = P>,
        F: Fn(P, Option<&Parameters>) + Send + Sync + 'static,
    {
        let targets: Vec<P> = targets.into_iter().collect();
        self.register(key, TestHandler::parameterized(handler).restrict(targets))
    }

    /// Remove the handler for `key`. Absent keys are ignored.
    pub fn remove_test(&self, key: K) -> Result<(), AbTestError> {
        self.with_pool(|pool| pool.remove(key.as_key()))
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run the handler registered under `key` with the current pattern.
    ///
    /// # Errors
    /// [`AbTestError::UnregisteredKey`] when nothing is registered under `key`;
    /// the host forgot `add_test` or already removed it.
    pub fn execute(&self, key: K) -> Result<(), AbTestError> {
        self.dispatch(key.as_key(), None)
    }

    /// Like [`execute`](Self::execute), passing `parameters` to a
    /// parameterized handler. Simple handlers ignore them.
    pub fn execute_with(&self, key: K, parameters: &Parameters) -> Result<(), AbTestError> {
        self.dispatch(key.as_key(), Some(parameters))
    }

    fn dispatch(&self, key: &str, parameters: Option<&Parameters>) -> Result<(), AbTestError> {
        let handler = self.with_pool(|pool| match pool.fetch(key) {
            Some(handler) => Ok(handler),
            None => Err(AbTestError::UnregisteredKey {
                key: key.to_string(),
                registered: pool.keys(),
            }),
        })?;
        let handler = match handler {
            Ok(h) => h,
            Err(e) => {
                warn!(key, "execute called for unregistered test");
                return Err(e);
            }
        };

        let pattern = self.pattern()?;
        trace!(key, ?pattern, "executing test");
        handler.call(pattern, parameters);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Number of registered tests.
    pub fn pool_count(&self) -> Result<usize, AbTestError> {
        self.with_pool(|pool| pool.count())
    }

    /// Registered keys, sorted.
    pub fn registered_keys(&self) -> Result<Vec<String>, AbTestError> {
        self.with_pool(|pool| pool.keys())
    }

    fn with_pool<R>(&self, f: impl FnOnce(&mut HandlerPool<P>) -> R) -> Result<R, AbTestError> {
        let mut guard = self.pool.lock().map_err(|_| AbTestError::LockPoisoned)?;
        let pool = guard.as_mut().ok_or(AbTestError::NotInstalled)?;
        Ok(f(pool))
    }
}

impl<K, P: Pattern> std::fmt::Debug for ExperimentController<K, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pool = self.pool.lock().ok().and_then(|p| p.as_ref().map(|p| p.count()));
        f.debug_struct("ExperimentController")
            .field("config", &self.config)
            .field("pool_count", &pool)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
