//! Error kinds observable by callers of a splittable counter.
//!
//! Only two of the five error kinds described by the design are ever
//! returned to a caller. `TransientConflict` is invisible by construction
//! (the host STM retries it transparently); `TransitionFailed` and
//! `BoundReached` are manager-internal and surface only as `tracing` events
//! (see [`crate::mrv::manager`] and [`crate::pr::manager`]).

use thiserror::Error;

/// The two ways a splittable operation can fail without the transaction
/// itself being retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    /// `sub(delta)` could not be satisfied by any layout reachable in this
    /// transaction attempt. The counter's value is unchanged.
    #[error("insufficient value to subtract requested delta")]
    InsufficientValue,
    /// `add(delta)` would carry a cell past `u32::MAX`.
    #[error("add would overflow u32")]
    Overflow,
}

/// Result type for `add`/`sub`: the committed outcome of one transaction
/// attempt, distinct from [`stm::StmResult`] which governs retry/blocking.
pub type OpResult<T> = Result<T, OpError>;
