//! The MRV (multi-record value) counter variant: a vector of cells whose
//! logical value is their sum, resized and rebalanced by [`manager`].

pub mod manager;

use std::sync::Arc;

use parking_lot::RwLock;
use stm::{StmResult, Transaction, TVar};

use crate::config::{BalanceStrategy, Tunables};
use crate::error::{OpError, OpResult};
use crate::random;
use crate::rt::{self, CounterId};
use crate::stats::{MrvStats, TrackStats};
use crate::Splittable;

use crossbeam_utils::CachePadded;

// Each chunk is kept behind its own `Arc` so that growing/shrinking the
// sequence can publish a new `Arc<[Chunk]>` that still shares the *same*
// transactional identity for every surviving index — a resize must not
// fork a cell into two independently-committing copies.
type Chunk = CachePadded<Arc<TVar<u32>>>;
type ChunkSeq = Arc<[Chunk]>;

/// A shared vector of transactional cells, published via copy-on-write.
///
/// `chunks` is read under a short `RwLock` read guard to clone the `Arc`
/// handle (cheap — it's a pointer bump), then used lock-free for the rest of
/// the operation. Resize/balance publish a brand-new `Arc<[Chunk]>` under the
/// write guard; no in-place mutation of a published sequence ever happens.
pub struct Mrv {
    id: CounterId,
    chunks: RwLock<ChunkSeq>,
    stats: MrvStats,
    tunables: Tunables,
}

fn new_chunk(value: u32) -> Chunk {
    CachePadded::new(Arc::new(TVar::new(value)))
}

impl Mrv {
    fn new(initial: u32, tunables: Tunables) -> Arc<Self> {
        let mrv = Arc::new(Mrv {
            id: CounterId::next(),
            chunks: RwLock::new(Arc::from(vec![new_chunk(initial)])),
            stats: MrvStats::default(),
            tunables,
        });
        manager::register(Arc::clone(&mrv));
        mrv
    }

    fn snapshot(&self) -> ChunkSeq {
        Arc::clone(&self.chunks.read())
    }

    /// Current number of chunks. Exposed for tests and introspection.
    pub fn chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Grows the chunk sequence per §4.3's `add_nodes`. No-op at `MAX_NODES`.
    pub(crate) fn add_nodes(&self, abort_rate: f64) {
        let snapshot = self.snapshot();
        let size = snapshot.len();
        if size >= self.tunables.max_nodes {
            tracing::debug!(counter = %self.id, "add_nodes: bound reached, no-op");
            return;
        }
        let growth = ((1.0 + size as f64 * abort_rate).ceil() as usize)
            .max(1)
            .min(self.tunables.max_nodes - size);

        let _guard = rt::STRUCTURAL_LOCK.lock();
        let mut grown: Vec<Chunk> = snapshot.iter().cloned().collect();
        grown.extend((0..growth).map(|_| new_chunk(0)));
        *self.chunks.write() = Arc::from(grown);
        tracing::debug!(counter = %self.id, growth, new_size = size + growth, "add_nodes");
    }

    /// Shrinks the chunk sequence by one, transferring its value to a
    /// surviving cell, per §4.3's `remove_node`. No-op below two chunks.
    pub(crate) fn remove_node(&self) {
        let snapshot = self.snapshot();
        let size = snapshot.len();
        if size < 2 {
            tracing::debug!(counter = %self.id, "remove_node: bound reached, no-op");
            return;
        }

        let _guard = rt::STRUCTURAL_LOCK.lock();
        let last = size - 1;
        let target = random::uniform_range(last);
        stm::atomically(|tx| {
            let drained = tx.read(&snapshot[last])?;
            tx.write(&snapshot[last], 0)?;
            let current = tx.read(&snapshot[target])?;
            tx.write(&snapshot[target], current.saturating_add(drained))?;
            Ok(())
        });

        let shrunk: Vec<Chunk> = snapshot[..last].iter().cloned().collect();
        *self.chunks.write() = Arc::from(shrunk);
        tracing::debug!(counter = %self.id, new_size = last, "remove_node");
    }

    /// Redistributes cell values without changing their sum, per §4.3's
    /// `balance` and the strategy selected in `self.tunables`.
    pub(crate) fn balance(&self) {
        match self.tunables.balance_strategy {
            BalanceStrategy::None => {}
            BalanceStrategy::Random => self.balance_random(),
            BalanceStrategy::MinMax => self.balance_min_max(),
            BalanceStrategy::MinMaxK => self.balance_min_max_k(),
            BalanceStrategy::All => {
                self.balance_min_max();
                self.balance_min_max_k();
                self.balance_random();
            }
        }
    }

    fn balance_min_max(&self) {
        let snapshot = self.snapshot();
        if snapshot.len() < 2 {
            return;
        }
        let min_diff = self.tunables.min_balance_diff;
        stm::atomically(|tx| {
            let mut values = Vec::with_capacity(snapshot.len());
            for chunk in snapshot.iter() {
                values.push(tx.read(chunk)?);
            }
            let (min_i, &min_v) = values
                .iter()
                .enumerate()
                .min_by_key(|&(_, v)| *v)
                .expect("non-empty");
            let (max_i, &max_v) = values
                .iter()
                .enumerate()
                .max_by_key(|&(_, v)| *v)
                .expect("non-empty");
            if max_v - min_v > min_diff {
                let half = (max_v + min_v) / 2;
                let remainder = (max_v + min_v) - half * 2;
                tx.write(&snapshot[max_i], half)?;
                tx.write(&snapshot[min_i], half + remainder)?;
            }
            Ok(())
        });
    }

    fn k_for(n: usize) -> usize {
        let k = if n < 4 {
            1
        } else if n <= 16 {
            2
        } else if n < 64 {
            n / 8
        } else {
            n / 16
        };
        k.clamp(1, n / 2)
    }

    fn balance_min_max_k(&self) {
        let snapshot = self.snapshot();
        let n = snapshot.len();
        if n < 2 {
            return;
        }
        let k = Self::k_for(n);
        stm::atomically(|tx| {
            let mut indexed = Vec::with_capacity(n);
            for (i, chunk) in snapshot.iter().enumerate() {
                indexed.push((i, tx.read(chunk)?));
            }
            indexed.sort_by_key(|&(_, v)| v);

            let selected: Vec<(usize, u32)> = indexed[..k]
                .iter()
                .chain(indexed[n - k..].iter())
                .copied()
                .collect();
            let sum: u64 = selected.iter().map(|&(_, v)| u64::from(v)).sum();
            let count = selected.len() as u64;
            let even = (sum / count) as u32;
            let remainder = (sum % count) as u32;

            for (pos, &(idx, _)) in selected.iter().enumerate() {
                let value = if pos == 0 { even + remainder } else { even };
                tx.write(&snapshot[idx], value)?;
            }
            Ok(())
        });
    }

    fn balance_random(&self) {
        let snapshot = self.snapshot();
        let n = snapshot.len();
        if n < 2 {
            return;
        }
        let min_diff = self.tunables.min_balance_diff;
        let a = random::uniform_range(n);
        let b = loop {
            let candidate = random::uniform_range(n);
            if candidate != a {
                break candidate;
            }
        };
        stm::atomically(|tx| {
            let va = tx.read(&snapshot[a])?;
            let vb = tx.read(&snapshot[b])?;
            let (lo, hi) = if va < vb { (va, vb) } else { (vb, va) };
            if hi - lo > min_diff {
                let half = (hi + lo) / 2;
                let remainder = (hi + lo) - half * 2;
                tx.write(&snapshot[a], half)?;
                tx.write(&snapshot[b], half + remainder)?;
            }
            Ok(())
        });
    }

    /// Reads and resets the rolling `(aborts, commits)` window, per §4.6.
    pub(crate) fn read_and_reset_stats(&self) -> (u16, u16) {
        self.stats.read_and_reset()
    }
}

impl Splittable for Mrv {
    fn id(&self) -> CounterId {
        self.id
    }

    fn stats(&self) -> Option<&dyn TrackStats> {
        Some(&self.stats)
    }

    fn deregister(&self) {
        manager::deregister(self.id);
    }

    fn read(&self, tx: &mut Transaction) -> StmResult<u32> {
        let snapshot = self.snapshot();
        let mut total: u32 = 0;
        for chunk in snapshot.iter() {
            total = total.saturating_add(tx.read(chunk)?);
        }
        Ok(total)
    }

    fn add(&self, tx: &mut Transaction, delta: u32) -> StmResult<OpResult<()>> {
        let snapshot = self.snapshot();
        let idx = random::uniform_range(snapshot.len());
        let current = tx.read(&snapshot[idx])?;
        Ok(match current.checked_add(delta) {
            Some(next) => {
                tx.write(&snapshot[idx], next)?;
                Ok(())
            }
            None => Err(OpError::Overflow),
        })
    }

    fn sub(&self, tx: &mut Transaction, delta: u32) -> StmResult<OpResult<()>> {
        let snapshot = self.snapshot();
        let n = snapshot.len();
        let start = random::uniform_range(n);
        let mut remaining = delta;

        for step in 0..n {
            let idx = (start + step) % n;
            let current = tx.read(&snapshot[idx])?;
            if current > remaining {
                tx.write(&snapshot[idx], current - remaining)?;
                return Ok(Ok(()));
            } else if current > 0 {
                tx.write(&snapshot[idx], 0)?;
                remaining -= current;
            }
        }

        self.stats.record_no_stock();
        Ok(Err(OpError::InsufficientValue))
    }
}

/// Constructs a new MRV counter starting at one chunk holding `initial`.
pub fn new_instance(initial: u32) -> crate::CounterHandle<Mrv> {
    new_instance_with(initial, Tunables::default())
}

/// As [`new_instance`], with per-counter tunable overrides.
pub fn new_instance_with(initial: u32, tunables: Tunables) -> crate::CounterHandle<Mrv> {
    crate::CounterHandle::from_arc(Mrv::new(initial, tunables))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_thread_sum() {
        let h = new_instance(0);
        for _ in 0..1000 {
            h.add(1).unwrap();
        }
        assert_eq!(h.read(), 1000);
    }

    #[test]
    fn sub_walk_drains_multiple_cells() {
        // S4: cells [3,0,7,0], sub(8) from a forced start index 0.
        let tunables = Tunables::default();
        let mrv = Mrv::new(0, tunables);
        *mrv.chunks.write() = Arc::from(vec![
            new_chunk(3),
            new_chunk(0),
            new_chunk(7),
            new_chunk(0),
        ]);
        let handle = crate::CounterHandle::from_arc(Arc::clone(&mrv));
        handle.sub(8).unwrap();
        assert_eq!(handle.read(), 2);
    }

    #[test]
    fn sub_insufficient_value_preserves_total() {
        // S5: cells summing to 5; sub(6) fails, read still 5.
        let tunables = Tunables::default();
        let mrv = Mrv::new(0, tunables);
        *mrv.chunks.write() = Arc::from(vec![new_chunk(2), new_chunk(3)]);
        let handle = crate::CounterHandle::from_arc(Arc::clone(&mrv));
        let err = handle.sub(6).unwrap_err();
        assert_eq!(err, OpError::InsufficientValue);
        assert_eq!(handle.read(), 5);
    }

    #[test]
    fn balance_min_max_preserves_sum() {
        // S6: [100,0,0,0] -> [50,50,0,0], total unchanged.
        let tunables = Tunables::default().with_balance_strategy(BalanceStrategy::MinMax);
        let mrv = Mrv::new(0, tunables);
        *mrv.chunks.write() = Arc::from(vec![
            new_chunk(100),
            new_chunk(0),
            new_chunk(0),
            new_chunk(0),
        ]);
        mrv.balance();
        let handle = crate::CounterHandle::from_arc(Arc::clone(&mrv));
        assert_eq!(handle.read(), 100);
        let values: Vec<u32> = mrv
            .snapshot()
            .iter()
            .map(|c| c.read_atomic())
            .collect();
        assert_eq!(values.iter().filter(|&&v| v == 50).count(), 2);
    }

    #[test]
    fn balance_min_max_k_preserves_sum() {
        let tunables = Tunables::default().with_balance_strategy(BalanceStrategy::MinMaxK);
        let mrv = Mrv::new(0, tunables);
        *mrv.chunks.write() = Arc::from(vec![
            new_chunk(0),
            new_chunk(10),
            new_chunk(20),
            new_chunk(100),
        ]);
        let before: u32 = mrv.snapshot().iter().map(|c| c.read_atomic()).sum();
        mrv.balance();
        let after: u32 = mrv.snapshot().iter().map(|c| c.read_atomic()).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn add_nodes_grows_and_conserves_sum() {
        let tunables = Tunables::default();
        let mrv = Mrv::new(7, tunables);
        let before_count = mrv.chunk_count();
        mrv.add_nodes(0.9);
        assert!(mrv.chunk_count() > before_count);
        let handle = crate::CounterHandle::from_arc(Arc::clone(&mrv));
        assert_eq!(handle.read(), 7);
    }

    #[test]
    fn add_nodes_noop_at_max() {
        let tunables = Tunables::default().with_max_nodes(1);
        let mrv = Mrv::new(5, tunables);
        mrv.add_nodes(0.9);
        assert_eq!(mrv.chunk_count(), 1);
    }

    #[test]
    fn remove_node_transfers_value_and_shrinks() {
        let tunables = Tunables::default();
        let mrv = Mrv::new(0, tunables);
        *mrv.chunks.write() = Arc::from(vec![new_chunk(3), new_chunk(4)]);
        mrv.remove_node();
        assert_eq!(mrv.chunk_count(), 1);
        let handle = crate::CounterHandle::from_arc(Arc::clone(&mrv));
        assert_eq!(handle.read(), 7);
    }

    #[test]
    fn remove_node_noop_below_two() {
        let tunables = Tunables::default();
        let mrv = Mrv::new(5, tunables);
        mrv.remove_node();
        assert_eq!(mrv.chunk_count(), 1);
    }

    #[test]
    fn concurrent_contended_add_sums_correctly() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let handle = StdArc::new(new_instance(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = StdArc::clone(&handle);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        handle.add(1).unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(handle.read(), 8000);
    }
}
