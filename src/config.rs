//! Tunable constants and the MRV balance-strategy policy.
//!
//! Matches §6 of the design: every constant is given both as a `const` (for
//! callers happy with the defaults) and as a field of [`Tunables`], which can
//! be customized per-counter with the same builder style the teacher repo
//! uses for naming counters (`with_name`-style, chained on a `const fn new`).

use std::time::Duration;

/// Below this abort rate, an MRV counter sheds a node.
pub const MIN_ABORT_RATE: f64 = 0.10;
/// Above this abort rate, an MRV counter grows.
pub const MAX_ABORT_RATE: f64 = 0.50;
/// Above this abort rate, a PR counter splits.
pub const PR_SPLIT_THRESHOLD: f64 = 0.65;
/// Upper bound on the number of chunks an MRV counter may hold.
pub const MAX_NODES: usize = 1024;
/// Smallest absolute gap between two MRV cells that a balance pass will act on.
pub const MIN_BALANCE_DIFF: u32 = 5;

/// How often the MRV manager re-evaluates grow/shrink decisions.
pub const ADJUST_INTERVAL: Duration = Duration::from_secs(1);
/// How often the MRV manager redistributes cell values.
pub const BALANCE_INTERVAL: Duration = Duration::from_millis(100);
/// How often the PR manager re-evaluates split/reconcile decisions.
pub const PHASE_INTERVAL: Duration = Duration::from_millis(20);

/// MRV's inter-cell redistribution policy.
///
/// `MinMax` and `MinMaxK` are the two strategies §4.3 specifies in detail;
/// both preserve the sum of all cells exactly. `Random` and `All` are the
/// remaining members of the `BALANCE_STRATEGY` enumeration from §6; `None`
/// disables balancing entirely (adjust still runs independently).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceStrategy {
    /// No redistribution; cell values only change via `add`/`sub`/`remove_node`.
    None,
    /// Pick two distinct cells at random and average them if they differ by
    /// more than [`MIN_BALANCE_DIFF`]. A legacy strategy mentioned but not
    /// canonicalized by the design notes.
    Random,
    /// Average the single min and max cell. The default: the simpler of the
    /// two canonical strategies and the one chosen for this implementation
    /// (see `DESIGN.md`).
    #[default]
    MinMax,
    /// Average the `k` smallest and `k` largest cells together, `k` scaled
    /// with the chunk count per §4.3's table.
    MinMaxK,
    /// Run `MinMax`, then `MinMaxK`, then `Random` in sequence each cycle.
    All,
}

/// Per-counter tunable overrides. `Default` reproduces the constants above.
///
/// The three interval constants (`ADJUST_INTERVAL`, `BALANCE_INTERVAL`,
/// `PHASE_INTERVAL`) are not here: they gate a single background thread
/// shared by every counter of a variant, so they are process-wide, not
/// per-counter (see `mrv::manager`/`pr::manager`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunables {
    pub min_abort_rate: f64,
    pub max_abort_rate: f64,
    pub pr_split_threshold: f64,
    pub max_nodes: usize,
    pub min_balance_diff: u32,
    pub balance_strategy: BalanceStrategy,
}

impl Tunables {
    pub const fn new() -> Self {
        Self {
            min_abort_rate: MIN_ABORT_RATE,
            max_abort_rate: MAX_ABORT_RATE,
            pr_split_threshold: PR_SPLIT_THRESHOLD,
            max_nodes: MAX_NODES,
            min_balance_diff: MIN_BALANCE_DIFF,
            balance_strategy: BalanceStrategy::MinMax,
        }
    }

    pub const fn with_balance_strategy(mut self, strategy: BalanceStrategy) -> Self {
        self.balance_strategy = strategy;
        self
    }

    pub const fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let t = Tunables::default();
        assert_eq!(t.min_abort_rate, MIN_ABORT_RATE);
        assert_eq!(t.max_abort_rate, MAX_ABORT_RATE);
        assert_eq!(t.pr_split_threshold, PR_SPLIT_THRESHOLD);
        assert_eq!(t.max_nodes, MAX_NODES);
        assert_eq!(t.balance_strategy, BalanceStrategy::MinMax);
    }

    #[test]
    fn builder_overrides_single_field() {
        let t = Tunables::new().with_balance_strategy(BalanceStrategy::MinMaxK);
        assert_eq!(t.balance_strategy, BalanceStrategy::MinMaxK);
        assert_eq!(t.max_nodes, MAX_NODES);
    }
}
