//! The `Single` counter variant: one transactional cell, no adaptation.
//!
//! Grounded directly in `source/single/single.cpp` of the original
//! implementation: `read` returns the cell, `add` writes `v + delta`, `sub`
//! checks `current < delta` before writing `v - delta`. This is the only
//! variant that needs no manager and no per-counter stats word (§4.2: "the
//! only body that need not be adaptive").

use stm::{StmResult, Transaction, TVar};

use crate::error::{OpError, OpResult};
use crate::rt::CounterId;
use crate::stats::TrackStats;
use crate::Splittable;

/// One transactional `u32` cell.
pub struct Single {
    id: CounterId,
    cell: TVar<u32>,
}

impl Single {
    fn new(initial: u32) -> Self {
        Single {
            id: CounterId::next(),
            cell: TVar::new(initial),
        }
    }
}

impl Splittable for Single {
    fn id(&self) -> CounterId {
        self.id
    }

    fn stats(&self) -> Option<&dyn TrackStats> {
        None
    }

    fn read(&self, tx: &mut Transaction) -> StmResult<u32> {
        tx.read(&self.cell)
    }

    fn add(&self, tx: &mut Transaction, delta: u32) -> StmResult<OpResult<()>> {
        let current = tx.read(&self.cell)?;
        Ok(match current.checked_add(delta) {
            Some(next) => {
                tx.write(&self.cell, next)?;
                Ok(())
            }
            None => Err(OpError::Overflow),
        })
    }

    fn sub(&self, tx: &mut Transaction, delta: u32) -> StmResult<OpResult<()>> {
        let current = tx.read(&self.cell)?;
        Ok(if current < delta {
            Err(OpError::InsufficientValue)
        } else {
            tx.write(&self.cell, current - delta)?;
            Ok(())
        })
    }
}

/// Constructs a new `Single` counter, per §6's `new_instance`.
pub fn new_instance(initial: u32) -> crate::CounterHandle<Single> {
    crate::CounterHandle::from_parts(Single::new(initial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_compose() {
        let h = new_instance(0);
        for _ in 0..1000 {
            h.add(1).unwrap();
        }
        assert_eq!(h.read(), 1000);
        for _ in 0..400 {
            h.sub(1).unwrap();
        }
        assert_eq!(h.read(), 600);
    }

    #[test]
    fn sub_insufficient_value_preserves_state() {
        let h = new_instance(5);
        let err = h.sub(6).unwrap_err();
        assert_eq!(err, OpError::InsufficientValue);
        assert_eq!(h.read(), 5);
    }

    #[test]
    fn add_overflow_preserves_state() {
        let h = new_instance(u32::MAX);
        let err = h.add(1).unwrap_err();
        assert_eq!(err, OpError::Overflow);
        assert_eq!(h.read(), u32::MAX);
    }

    #[test]
    fn concurrent_adds_sum_correctly() {
        use std::sync::Arc;
        use std::thread;

        let h = Arc::new(new_instance(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        h.add(1).unwrap();
                    }
                })
            })
            .collect();
        for t in handles {
            t.join().unwrap();
        }
        assert_eq!(h.read(), 8000);
    }
}
