//! Shared manager plumbing: the copy-on-write `{id -> weak counter}` map and
//! the background-task lifecycle described in §4.6 and §9, factored out so
//! [`crate::mrv::manager`] and [`crate::pr::manager`] don't each reinvent it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::rt::CounterId;

/// An immutable `{id -> weak counter}` map, swapped wholesale under a short
/// mutex — "the manager map... protected by a short mutex solely to swap the
/// whole immutable map value" (§5).
pub(crate) struct Registry<T> {
    map: Mutex<Arc<HashMap<CounterId, Weak<T>>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            map: Mutex::new(Arc::new(HashMap::new())),
        }
    }
}

impl<T> Registry<T> {
    pub fn register(&self, id: CounterId, weak: Weak<T>) {
        let mut guard = self.map.lock();
        let mut next = HashMap::clone(&guard);
        next.insert(id, weak);
        *guard = Arc::new(next);
    }

    pub fn deregister(&self, id: CounterId) {
        let mut guard = self.map.lock();
        if guard.contains_key(&id) {
            let mut next = HashMap::clone(&guard);
            next.remove(&id);
            *guard = Arc::new(next);
        }
    }

    /// A snapshot of all live (upgradeable) counters, silently skipping
    /// dangling weak references per §9 ("dangling weak references are
    /// skipped during periodic scans").
    pub fn live_snapshot(&self) -> Vec<Arc<T>> {
        self.map
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

/// A one-shot start flag, a stop token, and the join handles of whatever
/// background threads that flag started — shared by every manager's
/// background threads per §5 ("Background workers own stop tokens; on
/// shutdown, tokens are set, threads joined, pools drained").
pub(crate) struct Lifecycle {
    started: AtomicBool,
    stopping: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }
}

impl Lifecycle {
    /// Returns `true` exactly once, for the caller that should spawn the
    /// background threads.
    pub fn start_once(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn should_stop(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }

    /// Records a spawned background thread so [`Lifecycle::shutdown`] can
    /// join it later.
    pub fn track(&self, handle: JoinHandle<()>) {
        self.handles.lock().push(handle);
    }

    /// Sets the stop token and joins every tracked thread, draining the
    /// handle list. Safe to call more than once; a second call is a no-op
    /// since the handle list is already empty.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

/// Sleeps for `duration` in short ticks, returning early once `lifecycle` is
/// asked to stop, so `shutdown()` doesn't have to wait out a full manager
/// interval before joining the thread.
const SLEEP_TICK: Duration = Duration::from_millis(20);

pub(crate) fn interruptible_sleep(lifecycle: &Lifecycle, duration: Duration) {
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if lifecycle.should_stop() {
            return;
        }
        let tick = SLEEP_TICK.min(remaining);
        std::thread::sleep(tick);
        remaining -= tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_register_and_deregister() {
        let registry: Registry<u32> = Registry::default();
        let value = Arc::new(7u32);
        let id = CounterId::next();
        registry.register(id, Arc::downgrade(&value));
        assert_eq!(registry.live_snapshot().len(), 1);
        registry.deregister(id);
        assert_eq!(registry.live_snapshot().len(), 0);
    }

    #[test]
    fn registry_skips_dangling_weak_refs() {
        let registry: Registry<u32> = Registry::default();
        let id = CounterId::next();
        {
            let value = Arc::new(3u32);
            registry.register(id, Arc::downgrade(&value));
            assert_eq!(registry.live_snapshot().len(), 1);
        }
        assert_eq!(registry.live_snapshot().len(), 0);
    }

    #[test]
    fn lifecycle_start_once_is_exclusive() {
        let lifecycle = Lifecycle::default();
        assert!(lifecycle.start_once());
        assert!(!lifecycle.start_once());
    }

    #[test]
    fn lifecycle_shutdown_sets_stop_and_joins_tracked_threads() {
        let lifecycle = Lifecycle::default();
        assert!(!lifecycle.should_stop());
        lifecycle.track(std::thread::spawn(|| {}));
        lifecycle.shutdown();
        assert!(lifecycle.should_stop());
    }
}
