//! The client-facing counter handle, per §3's ownership model: "client
//! threads hold a strong handle; the manager holds a weak-back reference".

use std::sync::Arc;

use crate::error::OpResult;
use crate::rt::{self, CounterId};
use crate::Splittable;

/// A strong, cloneable reference to one counter of variant `V`.
///
/// Each operation runs inside its own `stm::atomically` call via
/// [`rt::run_tracked`], which is where abort/commit tallying happens (see
/// `rt` module docs).
pub struct CounterHandle<V> {
    pub(crate) inner: Arc<V>,
}

impl<V> Clone for CounterHandle<V> {
    fn clone(&self) -> Self {
        CounterHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Splittable> CounterHandle<V> {
    pub(crate) fn from_parts(value: V) -> Self {
        CounterHandle {
            inner: Arc::new(value),
        }
    }

    pub(crate) fn from_arc(inner: Arc<V>) -> Self {
        CounterHandle { inner }
    }

    /// The counter's stable identity.
    pub fn id(&self) -> CounterId {
        self.inner.id()
    }

    /// Reads the current logical value under a fresh transaction snapshot.
    pub fn read(&self) -> u32 {
        rt::run_tracked(self.inner.stats(), |tx| self.inner.read(tx))
    }

    /// Adds `delta` to the counter. See §4.1 for the `Overflow` condition.
    pub fn add(&self, delta: u32) -> OpResult<()> {
        rt::run_tracked(self.inner.stats(), |tx| self.inner.add(tx, delta))
    }

    /// Subtracts `delta` from the counter. See §4.1 for the
    /// `InsufficientValue` condition.
    pub fn sub(&self, delta: u32) -> OpResult<()> {
        rt::run_tracked(self.inner.stats(), |tx| self.inner.sub(tx, delta))
    }

    /// Direct access to the underlying counter body, for variant-specific
    /// operations (`Mrv::chunk_count`, `Pr::is_split`, ...).
    pub fn inner(&self) -> &V {
        &self.inner
    }
}

/// Deregisters (if applicable) and drops a counter handle, per §6's
/// `delete_instance`.
pub fn delete_instance<V: Splittable>(handle: CounterHandle<V>) {
    handle.inner.deregister();
}
