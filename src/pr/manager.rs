//! Background owner of every live [`super::Pr`] counter: one periodic phase
//! loop deciding `split`/`reconcile`, per §4.6.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use super::Pr;
use crate::config::PHASE_INTERVAL;
use crate::manager::{interruptible_sleep, Lifecycle, Registry};
use crate::rt::CounterId;
use crate::stats::IntervalStats;

struct ManagerState {
    registry: Registry<Pr>,
    lifecycle: Lifecycle,
    phase_stats: Mutex<IntervalStats>,
}

static STATE: OnceLock<ManagerState> = OnceLock::new();

fn state() -> &'static ManagerState {
    STATE.get_or_init(|| ManagerState {
        registry: Registry::default(),
        lifecycle: Lifecycle::default(),
        phase_stats: Mutex::new(IntervalStats::default()),
    })
}

pub(crate) fn register(pr: Arc<Pr>) {
    let state = state();
    state.registry.register(pr.id, Arc::downgrade(&pr));
    if state.lifecycle.start_once() {
        state.lifecycle.track(spawn_phase_worker());
    }
}

pub(crate) fn deregister(id: CounterId) {
    state().registry.deregister(id);
}

/// Stops the phase thread and joins it. Per §5: "on shutdown, tokens are
/// set, threads joined, pools drained". A no-op if the thread was never
/// started.
pub fn shutdown() {
    state().lifecycle.shutdown();
}

fn spawn_phase_worker() -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("splittable-pr-phase".into())
        .spawn(|| {
            let state = state();
            while !state.lifecycle.should_stop() {
                interruptible_sleep(&state.lifecycle, PHASE_INTERVAL);
                if state.lifecycle.should_stop() {
                    break;
                }
                let start = Instant::now();
                for counter in state.registry.live_snapshot() {
                    try_transition(&counter);
                }
                state.phase_stats.lock().record(start.elapsed());
            }
        })
        .expect("failed to spawn PR phase worker thread")
}

/// One counter's split/reconcile decision, per §4.6:
/// `is_split && (waiting>0 || aborts_no_stock>0) -> reconcile`;
/// `!is_split && rate > PR_SPLIT_THRESHOLD -> split`.
fn try_transition(counter: &Pr) {
    let (aborts, aborts_no_stock, commits, waiting) = counter.read_and_reset_stats();
    let split = counter.is_split();

    if split {
        if waiting > 0 || aborts_no_stock > 0 {
            counter.reconcile();
        }
        return;
    }

    let total = f64::from(aborts) + f64::from(commits);
    if total == 0.0 {
        return;
    }
    let abort_rate = f64::from(aborts) / total;
    if abort_rate > counter.tunables.pr_split_threshold {
        counter.split();
    }
}

/// The rolling average wall-time spent in one phase-worker iteration, across
/// all live PR counters. Per §6's introspection surface.
pub fn get_avg_phase_interval() -> std::time::Duration {
    state().phase_stats.lock().average()
}
