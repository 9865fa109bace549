use fixedbitset::FixedBitSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Engine;
use crate::variant::VariantSet;

// Fraction of a seeded disk's radius covered by the strict core.
const CORE_RADIUS_FACTOR: f64 = 0.85;

/// Macro region seeding configuration.
///
/// Before the main loop (and again after every restart) a handful of large
/// disk-shaped regions are carved into the grid, biased toward variants
/// whose base identifier is rich in the marker character. This produces
/// big coherent areas without hard-constraining any cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MacroConfig {
    /// Number of biased regions to carve.
    pub continents: usize,
    /// Lower disk radius bound, as a fraction of the shorter grid side.
    pub radius_min: f64,
    /// Upper disk radius bound, as a fraction of the shorter grid side.
    pub radius_max: f64,
    /// Minimum marker occurrences qualifying a variant for the strict core
    /// mask.
    pub core_min: usize,
    /// Minimum marker occurrences qualifying a variant for the loose rim
    /// mask.
    pub rim_min: usize,
    /// Identifier character counted to rate a variant's affinity.
    pub marker: char,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            continents: 3,
            radius_min: 0.18,
            radius_max: 0.35,
            core_min: 2,
            rim_min: 1,
            marker: 'g',
        }
    }
}

/// Precompute the strict and loose bias masks over the variant catalog.
pub(super) fn bias_masks(variants: &VariantSet, cfg: &MacroConfig) -> (FixedBitSet, FixedBitSet) {
    let len = variants.len();
    let mut core = FixedBitSet::with_capacity(len);
    let mut rim = FixedBitSet::with_capacity(len);
    for (index, variant) in variants.iter().enumerate() {
        let hits = variant.id().matches(cfg.marker).count();
        if hits >= cfg.core_min {
            core.insert(index);
        }
        if hits >= cfg.rim_min {
            rim.insert(index);
        }
    }
    (core, rim)
}

impl Engine {
    // Carve the configured disks. Cells inside the core radius intersect
    // with the strict mask (when it is non-empty), the rest of the disk
    // with the loose mask. A cell that would lose every option is left
    // untouched, so seeding can never contradict on its own; changed cells
    // are queued so the next drain spreads the consequences.
    pub(super) fn apply_macro_seeds(&mut self) {
        let Some(cfg) = self.macro_cfg.clone() else {
            return;
        };
        let width = self.grid.width();
        let height = self.grid.height();
        let span = width.min(height) as f64;
        for _ in 0..cfg.continents {
            let cx = self.rng.random_range(0..width) as isize;
            let cy = self.rng.random_range(0..height) as isize;
            let radius = span * self.rng.random_range(cfg.radius_min..=cfg.radius_max);
            let core_radius = (radius * CORE_RADIUS_FACTOR).floor();
            debug!(cx, cy, radius, "seeding macro region");

            let reach = radius.ceil() as isize;
            for y in (cy - reach).max(0)..=(cy + reach).min(height as isize - 1) {
                for x in (cx - reach).max(0)..=(cx + reach).min(width as isize - 1) {
                    let distance_sq = ((x - cx) * (x - cx) + (y - cy) * (y - cy)) as f64;
                    if distance_sq > radius * radius {
                        continue;
                    }
                    let mask = if distance_sq <= core_radius * core_radius
                        && !self.core_mask.is_clear()
                    {
                        &self.core_mask
                    } else {
                        &self.rim_mask
                    };
                    let cell = y as usize * width + x as usize;
                    let shrink = self.grid.intersect_if_compatible(cell, mask);
                    if shrink.changed() {
                        self.grid.mark_shrunk(cell);
                        self.grid.enqueue(cell);
                    }
                }
            }
        }
    }
}
