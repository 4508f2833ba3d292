//! Process-wide worker registration for the PR variant.
//!
//! Per §5's scheduling model ("a fixed pool of N worker threads") and §6's
//! `global_init`/`thread_init`/`set_num_threads`: PR's per-thread lane index
//! is process-local state, assigned once per OS thread and shared by every
//! PR counter in the process (not per-counter).

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NUM_WORKERS: AtomicUsize = AtomicUsize::new(1);
static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Fixes the number of registered workers, `N`, for PR's per-thread lanes.
/// Must be called once before any PR transaction runs.
pub fn global_init(num_workers: u32) {
    NUM_WORKERS.store(num_workers.max(1) as usize, Ordering::SeqCst);
}

/// Equivalent to [`global_init`], kept as a separate name for parity with
/// callers that think in terms of "how many threads will touch this".
pub fn set_num_threads(n: u32) {
    global_init(n);
}

/// The configured worker count, `N`.
pub fn num_workers() -> usize {
    NUM_WORKERS.load(Ordering::SeqCst)
}

/// Assigns this OS thread's dense lane id in `[0, N)` if it doesn't already
/// have one. Safe to call more than once; idempotent per thread.
///
/// The spec leaves behavior undefined once more than `N` distinct workers
/// register; rather than index out of bounds, extra workers wrap modulo `N`
/// and simply share a lane with an earlier one.
pub fn thread_init() -> usize {
    THREAD_ID.with(|cell| {
        if let Some(id) = cell.get() {
            return id;
        }
        let n = num_workers();
        let assigned = NEXT_THREAD_ID.fetch_add(1, Ordering::SeqCst) % n;
        cell.set(Some(assigned));
        assigned
    })
}

/// This OS thread's PR lane index, assigning one via [`thread_init`] on
/// first call.
pub(crate) fn thread_id() -> usize {
    thread_init()
}
