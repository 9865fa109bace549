//! # `tilewave`
//!
//! `tilewave` procedurally generates large 2D tile maps by constraint
//! propagation: every cell holds a bitset of still-possible tile variants,
//! the lowest-entropy cell is collapsed by weighted sampling, and the
//! consequences are propagated to neighbours until the grid settles or a
//! contradiction forces a bounded restart. Generation runs cooperatively in
//! bounded [`Engine::step`] calls, or on a background thread behind
//! [`EngineWorker`]'s message protocol so a host UI can observe progress.

// #![deny(warnings)]
#![deny(missing_docs)]
#![deny(clippy::all)]

mod catalog;
mod compat;
mod direction;
mod engine;
mod error;
mod event;
mod grid;
mod rng;
mod variant;
mod worker;

pub use catalog::{
    CATALOG_VERSION, EdgeRule, EdgeSpec, LoadedCatalog, TileDef, load_catalog, parse_catalog,
};
pub use compat::CompatTable;
pub use direction::{ALL_DIRECTIONS, Direction};
pub use engine::{Engine, EngineOptions, MacroConfig, Status};
pub use error::EngineError;
pub use event::{DrainDiag, Event};
pub use grid::{DomainGrid, Shrink};
pub use rng::Mulberry32;
pub use variant::{EdgeMap, Variant, VariantSet};
pub use worker::{BatchStats, CellTile, EngineMessage, EngineWorker, HostCommand, Mode};
