mod collapse;
mod propagate;
mod seed;

pub use seed::MacroConfig;

use bitvec::prelude::*;
use fixedbitset::FixedBitSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::TileDef;
use crate::compat::CompatTable;
use crate::error::EngineError;
use crate::event::Event;
use crate::grid::DomainGrid;
use crate::rng::Mulberry32;
use crate::variant::VariantSet;

use propagate::Contradiction;

/// Tunables for one generation session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Seed for the deterministic generator driving every random draw.
    pub seed: u32,
    /// Contradictions tolerated before the session fails terminally.
    pub max_restarts: u32,
    /// Expand the catalog with 90° clockwise rotation variants.
    pub allow_rotate: bool,
    /// Optional macro region seeding applied before the main loop.
    pub macro_grass: Option<MacroConfig>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            max_restarts: 10,
            allow_rotate: false,
            macro_grass: None,
        }
    }
}

/// Session status as observed between step calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Generation is still in progress.
    Active,
    /// Every cell is decided.
    Done,
    /// The restart budget was exhausted.
    Failed,
}

/// Constraint-propagation map generator over a rectangular grid.
///
/// The catalog and compatibility table are built once at construction and
/// stay immutable; domains, queue and version arrays are re-initialised on
/// every restart. All scratch used by the hot path is preallocated here.
pub struct Engine {
    variants: VariantSet,
    compat: CompatTable,
    grid: DomainGrid,
    rng: Mulberry32,
    attempts: u32,
    max_restarts: u32,
    macro_cfg: Option<MacroConfig>,
    core_mask: FixedBitSet,
    rim_mask: FixedBitSet,
    allowed: [FixedBitSet; 4],
    touched: BitVec,
    pick_options: Vec<usize>,
    pick_scores: Vec<f64>,
    events: Vec<Event>,
    status: Status,
}

impl Engine {
    /// Build an engine over a tile catalog and an empty grid.
    ///
    /// Fails when the grid is degenerate, the expanded catalog is empty or
    /// the macro seeding range is invalid; no partial state is left behind.
    pub fn new(
        tiles: &[TileDef],
        width: usize,
        height: usize,
        opts: EngineOptions,
    ) -> Result<Self, EngineError> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidGrid { width, height });
        }
        if let Some(cfg) = &opts.macro_grass {
            if !(cfg.radius_min >= 0.0 && cfg.radius_max >= cfg.radius_min)
                || !cfg.radius_max.is_finite()
            {
                return Err(EngineError::InvalidMacroRadius {
                    min: cfg.radius_min,
                    max: cfg.radius_max,
                });
            }
        }
        let variants = VariantSet::build(tiles, opts.allow_rotate);
        if variants.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        let compat = CompatTable::build(&variants);
        let num_variants = variants.len();
        let cells = width * height;
        let (core_mask, rim_mask) = match &opts.macro_grass {
            Some(cfg) => seed::bias_masks(&variants, cfg),
            None => (
                FixedBitSet::with_capacity(num_variants),
                FixedBitSet::with_capacity(num_variants),
            ),
        };
        debug!(
            width,
            height,
            variants = num_variants,
            "engine constructed"
        );
        let mut engine = Self {
            variants,
            compat,
            grid: DomainGrid::new(width, height, num_variants),
            rng: Mulberry32::new(opts.seed),
            attempts: 0,
            max_restarts: opts.max_restarts,
            macro_cfg: opts.macro_grass,
            core_mask,
            rim_mask,
            allowed: std::array::from_fn(|_| FixedBitSet::with_capacity(num_variants)),
            touched: bitvec![0; cells],
            pick_options: Vec::with_capacity(num_variants),
            pick_scores: Vec::with_capacity(num_variants),
            events: Vec::new(),
            status: Status::Active,
        };
        engine.apply_macro_seeds();
        Ok(engine)
    }

    /// Run the generation loop for at most `max_collapses` collapses.
    ///
    /// Pending propagation is drained first, then selection, collapse and
    /// propagation alternate until the budget is spent or the grid is
    /// finished. The returned events are valid until the next call; a
    /// `Restart` among them voids the collapses emitted before it. Calls on
    /// a terminal session return an empty slice and mutate nothing.
    pub fn step(&mut self, max_collapses: usize) -> &[Event] {
        self.events.clear();
        if self.status != Status::Active {
            return &self.events;
        }
        if let Err(contradiction) = self.drain() {
            if !self.recover(contradiction) {
                return &self.events;
            }
        }
        for _ in 0..max_collapses {
            if self.grid.fully_collapsed() {
                break;
            }
            let Some(cell) = self.pick_cell() else { break };
            let tile = self.pick_tile(cell);
            self.events.push(Event::Collapse { cell, tile });
            self.collapse_cell(cell, tile);
            if let Err(contradiction) = self.drain() {
                if !self.recover(contradiction) {
                    return &self.events;
                }
            }
        }
        if self.grid.fully_collapsed() {
            info!(cells = self.grid.cells(), "generation complete");
            self.status = Status::Done;
            self.events.push(Event::Done);
        }
        &self.events
    }

    // Restart controller: reset state and reseed regions until a drain
    // succeeds or the attempt budget runs out. The generator is never
    // reseeded, so successive attempts diverge.
    fn recover(&mut self, contradiction: Contradiction) -> bool {
        debug!(cell = contradiction.cell, "contradiction");
        loop {
            self.attempts += 1;
            if self.attempts > self.max_restarts {
                let message =
                    format!("map generation failed after {} restarts.", self.max_restarts);
                warn!(attempts = self.attempts, "restart budget exhausted");
                self.events.push(Event::Error { message });
                self.status = Status::Failed;
                return false;
            }
            debug!(attempt = self.attempts, "restarting");
            self.events.push(Event::Restart {
                attempt: self.attempts,
            });
            self.grid.reset();
            self.apply_macro_seeds();
            match self.drain() {
                Ok(()) => return true,
                Err(next) => debug!(cell = next.cell, "contradiction during reseed"),
            }
        }
    }

    /// Get the grid width in cells.
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    /// Get the grid height in cells.
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Get the total cell count.
    pub fn cells(&self) -> usize {
        self.grid.cells()
    }

    /// Get the number of variants in the expanded catalog.
    pub fn num_variants(&self) -> usize {
        self.variants.len()
    }

    /// Get the variant catalog.
    pub fn variants(&self) -> &VariantSet {
        &self.variants
    }

    /// Get the compatibility table.
    pub fn compat(&self) -> &CompatTable {
        &self.compat
    }

    /// Get a cell's domain bitset.
    pub fn domain(&self, cell: usize) -> &FixedBitSet {
        self.grid.domain(cell)
    }

    /// Get a cell's remaining option count.
    pub fn domain_count(&self, cell: usize) -> usize {
        self.grid.count(cell)
    }

    /// Get the variant a cell is decided on, if decided.
    pub fn variant_at(&self, cell: usize) -> Option<usize> {
        self.grid.solo(cell)
    }

    /// Get the number of cells observed by the collapser.
    pub fn collapsed_count(&self) -> usize {
        self.grid.collapsed_count()
    }

    /// Get the number of cells waiting in the propagation queue.
    pub fn queue_len(&self) -> usize {
        self.grid.queue_len()
    }

    /// Get the number of contradictions seen this session.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Get the session status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Snapshot the decided cells, `None` where a domain is still open.
    pub fn collapsed_map(&self) -> Array2<Option<usize>> {
        let width = self.grid.width();
        Array2::from_shape_fn((self.grid.height(), width), |(y, x)| {
            self.grid.solo(y * width + x)
        })
    }
}
