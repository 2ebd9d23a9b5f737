//! Stock decision functions for hosts.
//!
//! A controller only needs some `Fn() -> P`; these cover the common cases.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pattern::Pattern;

/// Uniformly random choice among `P::ALL`.
///
/// # Panics
/// If `P::ALL` is empty.
pub fn uniform<P: Pattern>() -> P {
    let mut rng = rand::thread_rng();
    P::ALL[rng.gen_range(0..P::ALL.len())]
}

/// Reproducible uniform choice: the returned closure yields the same sequence
/// of patterns for the same `seed`.
pub fn seeded<P: Pattern>(seed: u64) -> impl Fn() -> P + Send + Sync + 'static {
    let rng = Mutex::new(StdRng::seed_from_u64(seed));
    move || {
        let mut rng = match rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        P::ALL[rng.gen_range(0..P::ALL.len())]
    }
}

/// Always decides `pattern`.
pub fn fixed<P: Pattern>(pattern: P) -> impl Fn() -> P + Send + Sync + 'static {
    move || pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Arm {
        Left,
        Middle,
        Right,
    }

    crate::impl_pattern!(Arm { Left = 0, Middle = 1, Right = 2 });

    #[test]
    fn test_uniform_covers_all_variants() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(uniform::<Arm>().to_raw());
        }
        assert_eq!(seen.len(), 3, "seen={:?}", seen);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = seeded::<Arm>(42);
        let b = seeded::<Arm>(42);
        let xs: Vec<Arm> = (0..20).map(|_| a()).collect();
        let ys: Vec<Arm> = (0..20).map(|_| b()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_fixed_always_same() {
        let f = fixed(Arm::Middle);
        for _ in 0..5 {
            assert_eq!(f(), Arm::Middle);
        }
    }
}
