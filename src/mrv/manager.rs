//! Background owner of every live [`super::Mrv`] counter.
//!
//! Grounded in `source/mrv/manager.cpp`'s two worker threads: a balance
//! worker sleeping `BALANCE_INTERVAL` that redistributes each counter's
//! cells, and an adjust worker sleeping `ADJUST_INTERVAL` that grows/shrinks
//! based on the rolling abort rate. The `commits == 0` short-circuit is
//! checked *before* the abort-rate thresholds there, which this mirrors
//! exactly (see `SPEC_FULL.md`).

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::Mrv;
use crate::config::{ADJUST_INTERVAL, BALANCE_INTERVAL};
use crate::manager::{interruptible_sleep, Lifecycle, Registry};
use crate::rt::CounterId;
use crate::stats::IntervalStats;

struct ManagerState {
    registry: Registry<Mrv>,
    lifecycle: Lifecycle,
    balance_stats: Mutex<IntervalStats>,
    adjust_stats: Mutex<IntervalStats>,
}

static STATE: OnceLock<ManagerState> = OnceLock::new();

fn state() -> &'static ManagerState {
    STATE.get_or_init(|| ManagerState {
        registry: Registry::default(),
        lifecycle: Lifecycle::default(),
        balance_stats: Mutex::new(IntervalStats::default()),
        adjust_stats: Mutex::new(IntervalStats::default()),
    })
}

/// Registers a freshly constructed counter and, on first use, spawns the
/// balance and adjust background threads.
pub(crate) fn register(mrv: Arc<Mrv>) {
    let state = state();
    state.registry.register(mrv.id, Arc::downgrade(&mrv));
    if state.lifecycle.start_once() {
        state.lifecycle.track(spawn_balance_worker());
        state.lifecycle.track(spawn_adjust_worker());
    }
}

pub(crate) fn deregister(id: CounterId) {
    state().registry.deregister(id);
}

/// Stops the balance and adjust threads and joins them. Per §5: "on
/// shutdown, tokens are set, threads joined, pools drained". A no-op if the
/// threads were never started.
pub fn shutdown() {
    state().lifecycle.shutdown();
}

fn spawn_balance_worker() -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("splittable-mrv-balance".into())
        .spawn(|| {
            let state = state();
            while !state.lifecycle.should_stop() {
                interruptible_sleep(&state.lifecycle, BALANCE_INTERVAL);
                if state.lifecycle.should_stop() {
                    break;
                }
                let start = Instant::now();
                for counter in state.registry.live_snapshot() {
                    counter.balance();
                }
                state.balance_stats.lock().record(start.elapsed());
            }
        })
        .expect("failed to spawn MRV balance worker thread")
}

fn spawn_adjust_worker() -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("splittable-mrv-adjust".into())
        .spawn(|| {
            let state = state();
            while !state.lifecycle.should_stop() {
                interruptible_sleep(&state.lifecycle, ADJUST_INTERVAL);
                if state.lifecycle.should_stop() {
                    break;
                }
                let start = Instant::now();
                for counter in state.registry.live_snapshot() {
                    adjust_one(&counter);
                }
                state.adjust_stats.lock().record(start.elapsed());
            }
        })
        .expect("failed to spawn MRV adjust worker thread")
}

/// One counter's grow/shrink decision, per §4.6: if nothing committed in the
/// window, shed a node outright; otherwise compare the abort rate against
/// the counter's own thresholds.
fn adjust_one(counter: &Mrv) {
    let (aborts, commits) = counter.read_and_reset_stats();
    if commits == 0 {
        counter.remove_node();
        return;
    }
    let total = f64::from(aborts) + f64::from(commits);
    let abort_rate = f64::from(aborts) / total;
    if abort_rate < counter.tunables.min_abort_rate {
        counter.remove_node();
    } else if abort_rate > counter.tunables.max_abort_rate {
        counter.add_nodes(abort_rate);
    }
}

/// The rolling average wall-time spent in one balance-worker iteration,
/// across all live MRV counters. Per §6's introspection surface.
pub fn get_avg_balance_interval() -> Duration {
    state().balance_stats.lock().average()
}

/// As [`get_avg_balance_interval`], for the adjust worker.
pub fn get_avg_adjust_interval() -> Duration {
    state().adjust_stats.lock().average()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tunables;

    #[test]
    fn adjust_one_sheds_node_when_commits_zero() {
        let mrv = Mrv::new(5, Tunables::default());
        *mrv.chunks.write() = std::sync::Arc::from(vec![super::super::new_chunk(2), super::super::new_chunk(3)]);
        adjust_one(&mrv);
        assert_eq!(mrv.chunk_count(), 1);
    }

    #[test]
    fn adjust_one_grows_on_high_abort_rate() {
        let mrv = Mrv::new(5, Tunables::default());
        mrv.stats.record_commit();
        mrv.stats.record_aborts(20);
        let before = mrv.chunk_count();
        adjust_one(&mrv);
        assert!(mrv.chunk_count() > before);
    }

    #[test]
    fn adjust_one_shrinks_on_low_abort_rate() {
        let mrv = Mrv::new(0, Tunables::default());
        *mrv.chunks.write() = std::sync::Arc::from(vec![super::super::new_chunk(1), super::super::new_chunk(1)]);
        mrv.stats.record_commit();
        mrv.stats.record_commit();
        adjust_one(&mrv);
        assert_eq!(mrv.chunk_count(), 1);
    }

    #[test]
    fn register_and_deregister_reflected_in_registry() {
        let handle = super::super::new_instance(1);
        let id = handle.id();
        assert!(state().registry.live_snapshot().iter().any(|c| c.id == id));
        crate::handle::delete_instance(handle);
        assert!(!state().registry.live_snapshot().iter().any(|c| c.id == id));
    }

    #[test]
    fn shutdown_joins_background_threads_and_is_idempotent() {
        let _handle = super::super::new_instance(1);
        shutdown();
        shutdown();
    }
}
