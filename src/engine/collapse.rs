use rand::Rng;

use super::Engine;
use crate::direction::ALL_DIRECTIONS;

impl Engine {
    // Minimum-entropy selection over unobserved cells, scanning from a
    // random start so ties vary with the seed. A count of 2 cannot be
    // beaten by a later find (propagation-forced singles are claimed on
    // sight too), so the scan exits early.
    pub(super) fn pick_cell(&mut self) -> Option<usize> {
        let cells = self.grid.cells();
        let start = self.rng.random_range(0..cells);
        let mut best = None;
        let mut best_count = usize::MAX;
        for offset in 0..cells {
            let cell = (start + offset) % cells;
            if self.grid.is_collapsed(cell) {
                continue;
            }
            let count = self.grid.count(cell);
            if count < best_count {
                best_count = count;
                best = Some(cell);
                if count <= 2 {
                    break;
                }
            }
        }
        best
    }

    // Weighted choice over the cell's survivors. Each candidate's base
    // weight is multiplied, per decided neighbour, by one plus the summed
    // affinity of its facing edge rules; a vanishing total falls back to a
    // uniform draw. One generator draw drives the inverse-CDF walk.
    pub(super) fn pick_tile(&mut self, cell: usize) -> usize {
        self.pick_options.clear();
        self.pick_scores.clear();
        for variant in self.grid.domain(cell).ones() {
            self.pick_options.push(variant);
        }

        let mut total = 0.0;
        for &candidate in &self.pick_options {
            let mut score = self.variants.weight(candidate).max(0.0);
            if score > 0.0 {
                for dir in ALL_DIRECTIONS {
                    let Some(neighbor) = self.grid.neighbor(cell, dir) else {
                        continue;
                    };
                    let Some(fixed) = self.grid.solo(neighbor) else {
                        continue;
                    };
                    let facing = self.variants.side(fixed, dir.opposite());
                    let mut affinity = 0.0;
                    for (key, weight) in self.variants.side(candidate, dir) {
                        if let Some(facing_weight) = facing.get(key) {
                            affinity += weight * facing_weight;
                        }
                    }
                    score *= 1.0 + affinity;
                }
            }
            self.pick_scores.push(score);
            total += score;
        }

        if total <= 0.0 {
            let index = self.rng.random_range(0..self.pick_options.len());
            return self.pick_options[index];
        }
        let mut draw = self.rng.random_range(0.0..total);
        let mut chosen = self.pick_options.len() - 1;
        for (index, &score) in self.pick_scores.iter().enumerate() {
            if draw < score {
                chosen = index;
                break;
            }
            draw -= score;
        }
        self.pick_options[chosen]
    }

    // Restrict the cell, flag it observed and queue it for propagation.
    // Cells propagation already forced to a single variant keep their
    // version unchanged, so the drain skips them cheaply.
    pub(super) fn collapse_cell(&mut self, cell: usize, tile: usize) {
        if self.grid.count(cell) > 1 {
            self.grid.restrict_to(cell, tile);
            self.grid.mark_shrunk(cell);
        }
        self.grid.mark_collapsed(cell);
        self.grid.enqueue(cell);
    }
}
