//! # splittable - Contention-Adaptive Counters for Software Transactional Memory
//!
//! A shared integer variable that lives inside [`stm`] transactions and
//! reshapes its own physical layout in response to observed contention,
//! instead of forcing the caller to pick a data structure up front.
//!
//! ## The problem
//!
//! A counter backed by one `TVar<u32>` is correct under STM but becomes a
//! hotspot under concurrent writers: every transaction that touches it
//! conflicts with every other transaction touching it, and the abort rate
//! climbs with thread count. Splitting the counter into independent cells
//! fixes the hotspot but costs something on the read path (summing) and,
//! in the most aggressive form, blocks readers outright. Neither layout is
//! right for every workload, and workloads change shape at runtime.
//!
//! ## The solution: three layouts, chosen adaptively
//!
//! - [`single`] — one `TVar<u32>`. No adaptation; the right choice when
//!   contention never materializes.
//! - [`mrv`] — a vector of cells summed on read, grown or shrunk and
//!   periodically rebalanced by a background manager based on a rolling
//!   abort rate.
//! - [`pr`] — a single cell that can "split" into one private cell per
//!   worker thread under sustained contention; `read` blocks while split
//!   and resumes once the manager "reconciles" the lanes back down.
//!
//! A counter's variant is fixed at construction (`single::new_instance`,
//! `mrv::new_instance`, `pr::new_instance`); the manager only moves a
//! counter between sub-layouts of the same variant, never across variants.
//!
//! ## Quick start
//!
//! ```rust
//! use splittable::mrv;
//!
//! let counter = mrv::new_instance(0);
//! counter.add(1).unwrap();
//! counter.add(4).unwrap();
//! assert_eq!(counter.read(), 5);
//! counter.sub(2).unwrap();
//! assert_eq!(counter.read(), 3);
//! ```
//!
//! ## Thread registration (PR only)
//!
//! PR's per-thread lanes need the worker count fixed up front:
//!
//! ```rust
//! use splittable::{pr, threading};
//!
//! threading::global_init(4);
//! let counter = pr::new_instance(0);
//! counter.add(1).unwrap();
//! ```

pub mod config;
pub mod error;
mod handle;
mod manager;
pub mod mrv;
pub mod pr;
mod random;
pub mod report;
mod rt;
mod stats;
pub mod threading;

pub mod single;

pub use error::{OpError, OpResult};
pub use handle::{delete_instance, CounterHandle};
pub use rt::CounterId;
pub use stats::{get_global_stats, reset_global_stats, GlobalStats};

use stm::{StmResult, Transaction};

use crate::stats::TrackStats;

/// The interface every counter variant implements, regardless of physical
/// layout. Object-safe so a manager can hold `Arc<dyn Splittable>` if a
/// caller ever needs to mix variants in one collection.
pub trait Splittable: Send + Sync + 'static {
    /// This counter's stable identity, assigned once at construction.
    fn id(&self) -> CounterId;

    /// The per-counter stats word to tally this transaction's attempts
    /// against, if this variant carries one (`Single` does not).
    fn stats(&self) -> Option<&dyn TrackStats>;

    /// Removes this counter from its manager's registry, if it has one.
    /// The default no-op covers `Single`, which has no manager.
    fn deregister(&self) {}

    /// Reads the current logical value within `tx`.
    fn read(&self, tx: &mut Transaction) -> StmResult<u32>;

    /// Adds `delta`, reporting [`error::OpError::Overflow`] as the
    /// transaction's committed (not retried) outcome on saturation.
    fn add(&self, tx: &mut Transaction, delta: u32) -> StmResult<error::OpResult<()>>;

    /// Subtracts `delta`, reporting
    /// [`error::OpError::InsufficientValue`] as the transaction's committed
    /// outcome when the counter cannot satisfy it.
    fn sub(&self, tx: &mut Transaction, delta: u32) -> StmResult<error::OpResult<()>>;
}
