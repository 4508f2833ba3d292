//! The PR (phase-reconciled) counter variant: one shared cell while
//! `Unsplit`, one private cell per worker lane while `Split`. Reads block
//! for the duration of a split.

pub mod manager;

use std::sync::Arc;

use stm::{StmResult, Transaction, TVar};

use crate::config::Tunables;
use crate::error::{OpError, OpResult};
use crate::rt::{self, CounterId};
use crate::stats::{PrStats, TrackStats};
use crate::threading;
use crate::Splittable;

use crossbeam_utils::CachePadded;

type Lane = CachePadded<Arc<TVar<u32>>>;

/// Two states, `Unsplit` and `Split[n]`, modeled as a flag plus a
/// fixed-length vector of per-lane cells allocated once at construction
/// (`n` is the process-wide worker count fixed by [`crate::threading::global_init`]).
pub struct Pr {
    id: CounterId,
    is_split: TVar<bool>,
    single: TVar<u32>,
    lanes: Arc<[Lane]>,
    stats: PrStats,
    tunables: Tunables,
}

impl Pr {
    fn new(initial: u32, tunables: Tunables) -> Arc<Self> {
        let n = threading::num_workers();
        let lanes: Vec<Lane> = (0..n)
            .map(|_| CachePadded::new(Arc::new(TVar::new(0))))
            .collect();
        let pr = Arc::new(Pr {
            id: CounterId::next(),
            is_split: TVar::new(false),
            single: TVar::new(initial),
            lanes: Arc::from(lanes),
            stats: PrStats::default(),
            tunables,
        });
        manager::register(Arc::clone(&pr));
        pr
    }

    /// Whether the counter currently holds per-lane cells, for tests and
    /// introspection.
    pub fn is_split(&self) -> bool {
        stm::atomically(|tx| tx.read(&self.is_split))
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Distributes the single cell's value evenly across lanes (remainder to
    /// lane 0), then flips to `Split`. Run under the structural lock as an
    /// irrevocable transition (§4.4, §5). A no-op if already `Split` — the
    /// precondition no longer held, per §7's `TransitionFailed`.
    pub(crate) fn split(&self) {
        let _guard = rt::STRUCTURAL_LOCK.lock();
        let n = self.lanes.len() as u32;
        let transitioned = stm::atomically(|tx| {
            if tx.read(&self.is_split)? {
                return Ok(false);
            }
            let total = tx.read(&self.single)?;
            let share = total / n;
            let remainder = total % n;
            for (i, lane) in self.lanes.iter().enumerate() {
                let value = if i == 0 { share + remainder } else { share };
                tx.write(lane, value)?;
            }
            tx.write(&self.single, 0)?;
            tx.write(&self.is_split, true)?;
            Ok(true)
        });
        if transitioned {
            tracing::debug!(counter = %self.id, lanes = n, "split");
        } else {
            tracing::trace!(counter = %self.id, "split no-op, already split");
        }
    }

    /// Sums every lane back into the single cell, then flips to `Unsplit`. A
    /// no-op if already `Unsplit` — the precondition no longer held, per §7's
    /// `TransitionFailed`.
    pub(crate) fn reconcile(&self) {
        let _guard = rt::STRUCTURAL_LOCK.lock();
        let transitioned = stm::atomically(|tx| {
            if !tx.read(&self.is_split)? {
                return Ok(false);
            }
            let mut total: u32 = 0;
            for lane in self.lanes.iter() {
                total = total.saturating_add(tx.read(lane)?);
                tx.write(lane, 0)?;
            }
            tx.write(&self.single, total)?;
            tx.write(&self.is_split, false)?;
            Ok(true)
        });
        if transitioned {
            tracing::debug!(counter = %self.id, "reconcile");
        } else {
            tracing::trace!(counter = %self.id, "reconcile no-op, already unsplit");
        }
    }

    pub(crate) fn read_and_reset_stats(&self) -> (u16, u16, u16, u16) {
        self.stats.read_and_reset()
    }
}

impl Splittable for Pr {
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
        if tx.read(&self.is_split)? {
            self.stats.record_waiting();
            stm::retry()
        } else {
            tx.read(&self.single)
        }
    }

    fn add(&self, tx: &mut Transaction, delta: u32) -> StmResult<OpResult<()>> {
        if tx.read(&self.is_split)? {
            let lane = &self.lanes[threading::thread_id() % self.lanes.len()];
            let current = tx.read(lane)?;
            Ok(match current.checked_add(delta) {
                Some(next) => {
                    tx.write(lane, next)?;
                    Ok(())
                }
                None => Err(OpError::Overflow),
            })
        } else {
            let current = tx.read(&self.single)?;
            Ok(match current.checked_add(delta) {
                Some(next) => {
                    tx.write(&self.single, next)?;
                    Ok(())
                }
                None => Err(OpError::Overflow),
            })
        }
    }

    fn sub(&self, tx: &mut Transaction, delta: u32) -> StmResult<OpResult<()>> {
        if tx.read(&self.is_split)? {
            let lane = &self.lanes[threading::thread_id() % self.lanes.len()];
            let current = tx.read(lane)?;
            if current < delta {
                self.stats.record_no_stock();
                Ok(Err(OpError::InsufficientValue))
            } else {
                tx.write(lane, current - delta)?;
                Ok(Ok(()))
            }
        } else {
            let current = tx.read(&self.single)?;
            if current < delta {
                self.stats.record_no_stock();
                Ok(Err(OpError::InsufficientValue))
            } else {
                tx.write(&self.single, current - delta)?;
                Ok(Ok(()))
            }
        }
    }
}

/// Constructs a new PR counter with `n = `[`threading::num_workers`] lanes,
/// starting `Unsplit` at `initial`.
pub fn new_instance(initial: u32) -> crate::CounterHandle<Pr> {
    new_instance_with(initial, Tunables::default())
}

/// As [`new_instance`], with per-counter tunable overrides.
pub fn new_instance_with(initial: u32, tunables: Tunables) -> crate::CounterHandle<Pr> {
    crate::CounterHandle::from_arc(Pr::new(initial, tunables))
}
