//! Introspection snapshots: a reduced, counter-scoped cousin of the
//! teacher's generic metrics-export observers, limited to this crate's own
//! statistics surface (global abort/commit tallies, per-counter value).
//!
//! Everything here is additive sugar over [`crate::stats::get_global_stats`]
//! and [`crate::CounterHandle::read`]; none of it is required to use a
//! counter.

use crate::handle::CounterHandle;
use crate::stats::GlobalStats;
use crate::Splittable;

/// One counter's id and current value, for display or serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterReport {
    pub id: u32,
    pub value: u32,
}

impl CounterReport {
    /// Reads `handle` once and captures the result.
    pub fn from_handle<V: Splittable>(handle: &CounterHandle<V>) -> Self {
        CounterReport {
            id: handle.id().as_u32(),
            value: handle.read(),
        }
    }
}

/// A point-in-time view combining the process-wide abort/commit tallies
/// with a caller-supplied set of counter reports.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    pub global: GlobalStats,
    pub counters: Vec<CounterReport>,
}

impl Report {
    pub fn new(counters: Vec<CounterReport>) -> Self {
        Report {
            global: crate::stats::get_global_stats(),
            counters,
        }
    }
}

#[cfg(feature = "json")]
impl Report {
    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(feature = "table")]
pub mod table {
    //! Renders a [`super::Report`] as an ASCII table via `tabled`.

    use tabled::{Table, Tabled};

    use super::{CounterReport, Report};

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "id")]
        id: u32,
        #[tabled(rename = "value")]
        value: u32,
    }

    impl From<&CounterReport> for Row {
        fn from(r: &CounterReport) -> Self {
            Row {
                id: r.id,
                value: r.value,
            }
        }
    }

    /// Renders the report's counters as a table, with a trailing summary
    /// line for the global abort/commit tallies.
    pub fn render(report: &Report) -> String {
        let rows: Vec<Row> = report.counters.iter().map(Row::from).collect();
        let table = Table::new(rows).to_string();
        format!(
            "{table}\n\ntotal_aborts={} total_commits={}",
            report.global.aborts, report.global.commits
        )
    }
}
