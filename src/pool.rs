//! # Stage: Handler Pool
//!
//! ## Responsibility
//! Key-addressed storage of test handlers. A handler is one of two call shapes
//! (pattern only, or pattern plus free-form parameters) held in a tagged
//! [`TestHandler`], so dispatch recovers the shape by matching instead of a
//! runtime type check.
//!
//! ## Guarantees
//! - A key maps to at most one handler; re-adding a key replaces it
//! - `count()` equals the number of distinct keys present
//! - Removing an absent key is a no-op
//!
//! ## NOT Responsible For
//! - Pattern semantics or restriction policy beyond [`TestHandler::restrict`]
//! - Locking: the owning controller serializes access with a `Mutex`

use std::collections::HashMap;
use std::sync::Arc;

use crate::pattern::Pattern;

/// Free-form named parameters passed through `execute_with`.
pub type Parameters = HashMap<String, serde_json::Value>;

type SimpleFn<P> = dyn Fn(P) + Send + Sync;
type ParameterizedFn<P> = dyn Fn(P, Option<&Parameters>) + Send + Sync;

// ---------------------------------------------------------------------------
// TestHandler
// ---------------------------------------------------------------------------

/// A registered callback in one of its two call shapes.
pub enum TestHandler<P: Pattern> {
    /// Receives the resolved pattern only; parameters are ignored.
    Simple(Arc<SimpleFn<P>>),
    /// Receives the resolved pattern and the parameters given to `execute_with`.
    Parameterized(Arc<ParameterizedFn<P>>),
}

impl<P: Pattern> TestHandler<P> {
    pub fn simple<F>(f: F) -> Self
    where
        F: Fn(P) + Send + Sync + 'static,
    {
        TestHandler::Simple(Arc::new(f))
    }

    pub fn parameterized<F>(f: F) -> Self
    where
        F: Fn(P, Option<&Parameters>) + Send + Sync + 'static,
    {
        TestHandler::Parameterized(Arc::new(f))
    }

    /// Wrap the handler so it only runs when the pattern is one of `targets`.
    ///
    /// An empty `targets` means no restriction. The wrapper keeps the original
    /// call shape.
    pub fn restrict(self, targets: Vec<P>) -> Self {
        if targets.is_empty() {
            return self;
        }
        match self {
            TestHandler::Simple(inner) => TestHandler::Simple(Arc::new(move |pattern: P| {
                if !targets.contains(&pattern) {
                    tracing::trace!(?pattern, "pattern outside restriction; handler skipped");
                    return;
                }
                inner(pattern)
            })),
            TestHandler::Parameterized(inner) => TestHandler::Parameterized(Arc::new(
                move |pattern: P, parameters: Option<&Parameters>| {
                    if !targets.contains(&pattern) {
                        tracing::trace!(?pattern, "pattern outside restriction; handler skipped");
                        return;
                    }
                    inner(pattern, parameters)
                },
            )),
        }
    }

    /// Invoke with the resolved pattern. `parameters` only reach the
    /// parameterized shape.
    pub fn call(&self, pattern: P, parameters: Option<&Parameters>) {
        match self {
            TestHandler::Simple(f) => f(pattern),
            TestHandler::Parameterized(f) => f(pattern, parameters),
        }
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self, TestHandler::Parameterized(_))
    }
}

impl<P: Pattern> Clone for TestHandler<P> {
    fn clone(&self) -> Self {
        match self {
            TestHandler::Simple(f) => TestHandler::Simple(Arc::clone(f)),
            TestHandler::Parameterized(f) => TestHandler::Parameterized(Arc::clone(f)),
        }
    }
}

impl<P: Pattern> std::fmt::Debug for TestHandler<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestHandler::Simple(_)        => write!(f, "TestHandler::Simple"),
            TestHandler::Parameterized(_) => write!(f, "TestHandler::Parameterized"),
        }
    }
}

// ---------------------------------------------------------------------------
// HandlerPool
// ---------------------------------------------------------------------------

/// Registry of key → handler for a single controller.
pub struct HandlerPool<P: Pattern> {
    handlers: HashMap<String, TestHandler<P>>,
}

impl<P: Pattern> HandlerPool<P> {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Insert or replace the handler for `key`.
    pub fn add(&mut self, key: impl Into<String>, handler: TestHandler<P>) {
        self.handlers.insert(key.into(), handler);
    }

    /// Drop the handler for `key`, if any.
    pub fn remove(&mut self, key: &str) {
        self.handlers.remove(key);
    }

    /// The handler for `key` without invoking it.
    pub fn fetch(&self, key: &str) -> Option<TestHandler<P>> {
        self.handlers.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn count(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }
}

impl<P: Pattern> Default for HandlerPool<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pattern> std::fmt::Debug for HandlerPool<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerPool")
            .field("count", &self.count())
            .field("keys", &self.keys())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
