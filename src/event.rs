use serde::{Deserialize, Serialize};

/// Counters describing one propagation drain in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainDiag {
    /// Cells popped and re-examined so far.
    pub propagations: u64,
    /// Milliseconds elapsed since the drain began.
    pub elapsed_ms: u64,
    /// Total variant options eliminated across all cells.
    pub eliminated: u64,
    /// Unique cells whose domain shrank.
    pub cells_touched: u64,
    /// Largest single-cell entropy drop observed.
    pub max_drop: usize,
}

/// One engine event, emitted in the order it occurred within a step call.
///
/// A `Restart` voids every `Collapse` emitted earlier in the same call
/// since the previous `Restart`; hosts must discard them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    /// A cell was fixed to a single variant; its propagation drain runs
    /// before the next collapse begins.
    Collapse {
        /// Flat cell index, `y * width + x`.
        cell: usize,
        /// Chosen variant index.
        tile: usize,
    },
    /// A contradiction reset the grid state.
    Restart {
        /// Contradictions seen so far this session.
        attempt: u32,
    },
    /// Every cell is decided; terminal for the session.
    Done,
    /// The restart budget is exhausted; terminal for the session.
    Error {
        /// Human-readable failure description.
        message: String,
    },
    /// Advisory drain diagnostics, throttled while propagation runs long.
    Progress {
        /// Counters for the drain currently running.
        diag: DrainDiag,
    },
}
