//! Per-counter and process-wide statistics.
//!
//! Per §3, MRV packs `(aborts, commits)` into one 32-bit word and PR packs
//! `(aborts, aborts_no_stock, commits, waiting)` into one 64-bit word, both
//! lock-free. Global totals are two independent 64-bit atomics.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

static GLOBAL_ABORTS: AtomicU64 = AtomicU64::new(0);
static GLOBAL_COMMITS: AtomicU64 = AtomicU64::new(0);

/// Process-wide abort/commit tallies, per §6's `get_global_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalStats {
    pub aborts: u64,
    pub commits: u64,
}

/// A trait object usable by [`crate::rt::run_tracked`] to bump whichever
/// per-counter stats word a variant carries (or none, for `Single`).
pub(crate) trait TrackStats: Send + Sync {
    fn record_commit(&self);
    fn record_aborts(&self, n: u32);
}

pub(crate) fn record_global(aborts: u32, commits: u32) {
    if aborts > 0 {
        GLOBAL_ABORTS.fetch_add(aborts as u64, Ordering::Relaxed);
    }
    if commits > 0 {
        GLOBAL_COMMITS.fetch_add(commits as u64, Ordering::Relaxed);
    }
}

/// Reads the process-wide abort/commit tallies.
pub fn get_global_stats() -> GlobalStats {
    GlobalStats {
        aborts: GLOBAL_ABORTS.load(Ordering::Relaxed),
        commits: GLOBAL_COMMITS.load(Ordering::Relaxed),
    }
}

/// Resets the process-wide abort/commit tallies to zero.
pub fn reset_global_stats() {
    GLOBAL_ABORTS.store(0, Ordering::Relaxed);
    GLOBAL_COMMITS.store(0, Ordering::Relaxed);
}

#[inline]
fn pack32(aborts: u16, commits: u16) -> u32 {
    (u32::from(aborts) << 16) | u32::from(commits)
}

#[inline]
fn unpack32(word: u32) -> (u16, u16) {
    ((word >> 16) as u16, word as u16)
}

/// MRV's rolling `(aborts, commits)` window, reset every adjustment phase.
#[derive(Default)]
pub(crate) struct MrvStats(AtomicU32);

impl MrvStats {
    fn update(&self, f: impl Fn(u16, u16) -> (u16, u16)) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let (aborts, commits) = unpack32(current);
            let (na, nc) = f(aborts, commits);
            let next = pack32(na, nc);
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns `(aborts, commits)` and resets both to zero.
    pub fn read_and_reset(&self) -> (u16, u16) {
        unpack32(self.0.swap(0, Ordering::Relaxed))
    }
}

impl TrackStats for MrvStats {
    fn record_commit(&self) {
        self.update(|a, c| (a, c.wrapping_add(1)));
    }

    fn record_aborts(&self, n: u32) {
        if n == 0 {
            return;
        }
        let n = n.min(u16::MAX as u32) as u16;
        self.update(|a, c| (a.wrapping_add(n), c));
    }
}

#[inline]
fn pack64(aborts: u16, aborts_no_stock: u16, commits: u16, waiting: u16) -> u64 {
    (u64::from(aborts) << 48)
        | (u64::from(aborts_no_stock) << 32)
        | (u64::from(commits) << 16)
        | u64::from(waiting)
}

#[inline]
fn unpack64(word: u64) -> (u16, u16, u16, u16) {
    (
        (word >> 48) as u16,
        (word >> 32) as u16,
        (word >> 16) as u16,
        word as u16,
    )
}

/// PR's rolling `(aborts, aborts_no_stock, commits, waiting)` window.
#[derive(Default)]
pub(crate) struct PrStats(AtomicU64);

impl PrStats {
    fn update(&self, f: impl Fn(u16, u16, u16, u16) -> (u16, u16, u16, u16)) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let (a, n, c, w) = unpack64(current);
            let (na, nn, nc, nw) = f(a, n, c, w);
            let next = pack64(na, nn, nc, nw);
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns `(aborts, aborts_no_stock, commits, waiting)` and resets all
    /// four lanes to zero.
    pub fn read_and_reset(&self) -> (u16, u16, u16, u16) {
        unpack64(self.0.swap(0, Ordering::Relaxed))
    }

    pub fn record_no_stock(&self) {
        self.update(|a, n, c, w| (a, n.wrapping_add(1), c, w));
    }

    pub fn record_waiting(&self) {
        self.update(|a, n, c, w| (a, n, c, w.wrapping_add(1)));
    }
}

impl TrackStats for PrStats {
    fn record_commit(&self) {
        self.update(|a, n, c, w| (a, n, c.wrapping_add(1), w));
    }

    fn record_aborts(&self, count: u32) {
        if count == 0 {
            return;
        }
        let count = count.min(u16::MAX as u32) as u16;
        self.update(|a, n, c, w| (a.wrapping_add(count), n, c, w));
    }
}

/// Aggregated wall-time spent inside a manager's periodic task, per §4.6.
#[derive(Default, Clone, Copy)]
pub(crate) struct IntervalStats {
    total: Duration,
    iterations: u64,
}

impl IntervalStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.iterations += 1;
    }

    pub fn average(&self) -> Duration {
        if self.iterations == 0 {
            Duration::ZERO
        } else {
            self.total / self.iterations as u32
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_stats_round_trip() {
        reset_global_stats();
        record_global(3, 7);
        let s = get_global_stats();
        assert_eq!(s.aborts, 3);
        assert_eq!(s.commits, 7);
        reset_global_stats();
        assert_eq!(get_global_stats(), GlobalStats::default());
    }

    #[test]
    fn mrv_stats_pack_unpack() {
        let stats = MrvStats::default();
        stats.record_aborts(4);
        stats.record_commit();
        stats.record_commit();
        let (a, c) = stats.read_and_reset();
        assert_eq!(a, 4);
        assert_eq!(c, 2);
        assert_eq!(stats.read_and_reset(), (0, 0));
    }

    #[test]
    fn pr_stats_pack_unpack() {
        let stats = PrStats::default();
        stats.record_aborts(2);
        stats.record_no_stock();
        stats.record_commit();
        stats.record_waiting();
        stats.record_waiting();
        let (a, n, c, w) = stats.read_and_reset();
        assert_eq!((a, n, c, w), (2, 1, 1, 2));
        assert_eq!(stats.read_and_reset(), (0, 0, 0, 0));
    }

    #[test]
    fn interval_stats_average() {
        let mut stats = IntervalStats::default();
        assert_eq!(stats.average(), Duration::ZERO);
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(20));
        assert_eq!(stats.average(), Duration::from_millis(15));
        stats.reset();
        assert_eq!(stats.average(), Duration::ZERO);
    }
}
