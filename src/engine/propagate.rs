use std::time::Instant;

use tracing::trace;

use super::Engine;
use crate::direction::ALL_DIRECTIONS;
use crate::event::{DrainDiag, Event};

// Pops between throttle checks, and the minimum spacing of progress events.
const PROGRESS_CHECK_EVERY: u64 = 256;
const PROGRESS_INTERVAL_MS: u128 = 100;

/// An emptied cell discovered while draining.
pub(super) struct Contradiction {
    pub(super) cell: usize,
}

impl Engine {
    // Arc-consistency drain specialised to the four-direction grid: any
    // neighbour variant outside the union of the compatibility rows of a
    // cell's survivors can pair with nothing that remains there, so it is
    // removed. Stops at the first emptied neighbour.
    pub(super) fn drain(&mut self) -> Result<(), Contradiction> {
        if self.grid.queue_len() == 0 {
            return Ok(());
        }
        let started = Instant::now();
        let mut last_emitted_ms = 0u128;
        let mut diag = DrainDiag::default();
        self.touched.fill(false);

        while let Some(cell) = self.grid.pop() {
            if !self.grid.take_pending(cell) {
                continue;
            }

            // One pass over the survivors fills all four allowed masks.
            for mask in &mut self.allowed {
                mask.clear();
            }
            let masks = self.compat.masks();
            for variant in self.grid.domain(cell).ones() {
                for dir in 0..4 {
                    self.allowed[dir].union_with(&masks[variant][dir]);
                }
            }

            for dir in ALL_DIRECTIONS {
                let Some(neighbor) = self.grid.neighbor(cell, dir) else {
                    continue;
                };
                let shrink = self.grid.intersect(neighbor, &self.allowed[dir.index()]);
                if !shrink.changed() {
                    continue;
                }
                diag.eliminated += shrink.dropped() as u64;
                diag.max_drop = diag.max_drop.max(shrink.dropped());
                if !self.touched[neighbor] {
                    self.touched.set(neighbor, true);
                    diag.cells_touched += 1;
                }
                if shrink.emptied() {
                    trace!(cell = neighbor, "domain emptied");
                    return Err(Contradiction { cell: neighbor });
                }
                self.grid.mark_shrunk(neighbor);
                self.grid.enqueue(neighbor);
            }

            diag.propagations += 1;
            if diag.propagations % PROGRESS_CHECK_EVERY == 0 {
                let elapsed = started.elapsed().as_millis();
                if elapsed - last_emitted_ms >= PROGRESS_INTERVAL_MS {
                    last_emitted_ms = elapsed;
                    diag.elapsed_ms = elapsed as u64;
                    self.events.push(Event::Progress { diag });
                }
            }
        }
        Ok(())
    }
}
