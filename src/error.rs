use thiserror::Error;

/// Errors surfaced when constructing an engine.
///
/// Construction either succeeds completely or fails with one of these; no
/// partial state is left behind. Everything that can go wrong *after*
/// construction travels through the event stream instead.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// Catalog expansion produced no variants to place.
    #[error("tile catalog produced no variants")]
    EmptyCatalog,

    /// Both grid dimensions must be at least one cell.
    #[error("invalid grid size {width}x{height}")]
    InvalidGrid {
        /// Requested grid width.
        width: usize,
        /// Requested grid height.
        height: usize,
    },

    /// The macro seeding radius range is not a valid sub-unit interval.
    #[error("invalid macro seed radius range [{min}, {max}]")]
    InvalidMacroRadius {
        /// Configured lower radius fraction.
        min: f64,
        /// Configured upper radius fraction.
        max: f64,
    },
}
