//! Uniform random index selection.
//!
//! §4.7 requires a thread-local, lock-free, distribution-uniform source;
//! [`rand::thread_rng`] is exactly that (a thread-local `Rng` seeded from the
//! OS on first use per thread), so there is no need to hand-roll one.

use rand::Rng;

/// A uniform index in `[0, len)`. Panics if `len == 0`, matching the
/// precondition every caller already establishes (chunk vectors are never
/// empty — MRV never resizes below 1, PR's chunk count is fixed at `N >= 1`).
#[inline]
pub fn uniform_range(len: usize) -> usize {
    assert!(len > 0, "uniform_range requires a non-empty range");
    if len == 1 {
        return 0;
    }
    rand::thread_rng().gen_range(0..len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uniform_range_stays_in_bounds() {
        for _ in 0..1000 {
            let v = uniform_range(7);
            assert!(v < 7);
        }
    }

    #[test]
    fn uniform_range_single_is_zero() {
        for _ in 0..10 {
            assert_eq!(uniform_range(1), 0);
        }
    }

    #[test]
    fn uniform_range_visits_every_slot() {
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            seen.insert(uniform_range(5));
        }
        assert_eq!(seen.len(), 5);
    }
}
