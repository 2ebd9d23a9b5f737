//! # Patterns, test keys and check timing
//!
//! A [`Pattern`] is one variant of an experiment, a closed enumeration with a
//! stable integer encoding used for persistence. A [`TestKey`] names one
//! handler slot in a controller's pool through its stable string form.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// One variant of an experiment (A/B/C/D...).
///
/// `to_raw` / `from_raw` must round-trip for every member of [`Pattern::ALL`];
/// the raw value is what gets written to the [`PatternStore`](crate::store::PatternStore),
/// so changing it invalidates persisted assignments.
///
/// Fieldless enums usually implement this with [`impl_pattern!`](crate::impl_pattern).
pub trait Pattern: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// Stable integer encoding.
    fn to_raw(self) -> i64;

    /// Inverse of [`to_raw`](Self::to_raw). `None` for unknown values.
    fn from_raw(raw: i64) -> Option<Self>;
}

/// Implement [`Pattern`] for a fieldless enum from an explicit raw-value list.
///
/// ```
/// use abtest_pool::{impl_pattern, Pattern};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Color { Red, Green }
///
/// impl_pattern!(Color { Red = 0, Green = 1 });
///
/// assert_eq!(Color::from_raw(1), Some(Color::Green));
/// assert_eq!(Color::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! impl_pattern {
    ($ty:ident { $($variant:ident = $raw:expr),+ $(,)? }) => {
        impl $crate::pattern::Pattern for $ty {
            const ALL: &'static [Self] = &[$($ty::$variant),+];

            fn to_raw(self) -> i64 {
                match self {
                    $($ty::$variant => $raw,)+
                }
            }

            fn from_raw(raw: i64) -> ::std::option::Option<Self> {
                $(
                    if raw == $raw {
                        return ::std::option::Option::Some($ty::$variant);
                    }
                )+
                ::std::option::Option::None
            }
        }
    };
}

// ---------------------------------------------------------------------------
// TestKey
// ---------------------------------------------------------------------------

/// Identifies one registered test within a controller. Two keys with the same
/// string form are interchangeable.
pub trait TestKey {
    fn as_key(&self) -> &str;
}

impl TestKey for str {
    fn as_key(&self) -> &str {
        self
    }
}

impl TestKey for String {
    fn as_key(&self) -> &str {
        self.as_str()
    }
}

impl<T: TestKey + ?Sized> TestKey for &T {
    fn as_key(&self) -> &str {
        (**self).as_key()
    }
}

// ---------------------------------------------------------------------------
// CheckTiming
// ---------------------------------------------------------------------------

/// When the resolved pattern is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTiming {
    /// Decide once and persist under the save key until reset.
    #[default]
    Once,
    /// Call the decision function on every resolution; nothing is persisted.
    EveryTime,
}

impl std::fmt::Display for CheckTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckTiming::Once      => write!(f, "once"),
            CheckTiming::EveryTime => write!(f, "every_time"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
