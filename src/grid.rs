use bitvec::prelude::*;
use fixedbitset::FixedBitSet;

use crate::direction::Direction;

/// Outcome of shrinking one cell's domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shrink {
    /// Possibilities before the operation.
    pub before: usize,
    /// Possibilities after the operation.
    pub after: usize,
}

impl Shrink {
    /// Check whether any bit was removed.
    pub fn changed(self) -> bool {
        self.after != self.before
    }

    /// Check whether the domain was emptied.
    pub fn emptied(self) -> bool {
        self.after == 0
    }

    /// Get the number of options removed.
    pub fn dropped(self) -> usize {
        self.before - self.after
    }
}

/// Per-cell variant domains for a rectangular grid, plus the propagation
/// work queue and its bookkeeping.
///
/// Domains are word-packed bitsets; bit `k` of cell `c` means variant `k`
/// is still possible at `c`. Cells index as `y * width + x`. The queue is a
/// stack with a membership bitmap so a cell is enqueued at most once, and
/// the `dom_ver`/`prop_ver` counters let the propagator skip pops that
/// carry no new information.
pub struct DomainGrid {
    width: usize,
    height: usize,
    num_variants: usize,
    domains: Vec<FixedBitSet>,
    dom_ver: Vec<u64>,
    prop_ver: Vec<u64>,
    stack: Vec<usize>,
    in_queue: BitVec,
    collapsed: BitVec,
    collapsed_count: usize,
}

impl DomainGrid {
    /// Construct a grid with every cell holding the full domain.
    pub fn new(width: usize, height: usize, num_variants: usize) -> Self {
        debug_assert!(width > 0 && height > 0);
        debug_assert!(num_variants > 0);
        let cells = width * height;
        let mut full = FixedBitSet::with_capacity(num_variants);
        full.insert_range(..);
        Self {
            width,
            height,
            num_variants,
            domains: vec![full; cells],
            dom_ver: vec![0; cells],
            prop_ver: vec![0; cells],
            stack: Vec::with_capacity(cells),
            in_queue: bitvec![0; cells],
            collapsed: bitvec![0; cells],
            collapsed_count: 0,
        }
    }

    /// Get the grid width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Get the grid height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the total cell count.
    pub fn cells(&self) -> usize {
        self.domains.len()
    }

    /// Get the variant catalog size the domains range over.
    pub fn num_variants(&self) -> usize {
        self.num_variants
    }

    /// Get the neighbouring cell index in one direction, if on-grid.
    pub fn neighbor(&self, cell: usize, dir: Direction) -> Option<usize> {
        let x = cell % self.width;
        let y = cell / self.width;
        let (dx, dy) = dir.offset();
        let nx = x.checked_add_signed(dx).filter(|&nx| nx < self.width)?;
        let ny = y.checked_add_signed(dy).filter(|&ny| ny < self.height)?;
        Some(ny * self.width + nx)
    }

    /// Get a cell's domain bitset.
    pub fn domain(&self, cell: usize) -> &FixedBitSet {
        &self.domains[cell]
    }

    /// Get a cell's remaining option count.
    pub fn count(&self, cell: usize) -> usize {
        self.domains[cell].count_ones(..)
    }

    /// Get the single remaining variant of a decided cell, if decided.
    pub fn solo(&self, cell: usize) -> Option<usize> {
        let mut ones = self.domains[cell].ones();
        let first = ones.next()?;
        if ones.next().is_some() { None } else { Some(first) }
    }

    /// Record that a cell's domain shrank since it was last propagated.
    pub fn mark_shrunk(&mut self, cell: usize) {
        self.dom_ver[cell] += 1;
    }

    /// Claim a popped cell for propagation.
    ///
    /// Returns false when nothing changed since the last drain from this
    /// cell, in which case the pop must be skipped.
    pub fn take_pending(&mut self, cell: usize) -> bool {
        if self.prop_ver[cell] == self.dom_ver[cell] {
            return false;
        }
        self.prop_ver[cell] = self.dom_ver[cell];
        true
    }

    /// Push a cell onto the work queue unless it is already queued.
    pub fn enqueue(&mut self, cell: usize) {
        if !self.in_queue[cell] {
            self.in_queue.set(cell, true);
            self.stack.push(cell);
        }
    }

    /// Pop the most recently queued cell and clear its membership flag.
    pub fn pop(&mut self) -> Option<usize> {
        let cell = self.stack.pop()?;
        self.in_queue.set(cell, false);
        Some(cell)
    }

    /// Get the number of queued cells.
    pub fn queue_len(&self) -> usize {
        self.stack.len()
    }

    /// Intersect a cell's domain with a mask, reporting the shrink.
    pub fn intersect(&mut self, cell: usize, mask: &FixedBitSet) -> Shrink {
        let domain = &mut self.domains[cell];
        let before = domain.count_ones(..);
        domain.intersect_with(mask);
        let after = domain.count_ones(..);
        Shrink { before, after }
    }

    /// Intersect with a mask only when the result would be non-empty.
    ///
    /// Used by region seeding, which biases cells it can reach but must
    /// never manufacture a contradiction; an incompatible cell is left
    /// exactly as it was.
    pub fn intersect_if_compatible(&mut self, cell: usize, mask: &FixedBitSet) -> Shrink {
        let domain = &mut self.domains[cell];
        let before = domain.count_ones(..);
        if domain.is_disjoint(mask) {
            return Shrink {
                before,
                after: before,
            };
        }
        domain.intersect_with(mask);
        let after = domain.count_ones(..);
        Shrink { before, after }
    }

    /// Restrict a cell to a single variant.
    pub fn restrict_to(&mut self, cell: usize, variant: usize) -> Shrink {
        debug_assert!(self.domains[cell].contains(variant));
        let domain = &mut self.domains[cell];
        let before = domain.count_ones(..);
        domain.clear();
        domain.insert(variant);
        Shrink { before, after: 1 }
    }

    /// Check whether a cell has been observed by the collapser.
    pub fn is_collapsed(&self, cell: usize) -> bool {
        self.collapsed[cell]
    }

    /// Flag a cell as observed.
    pub fn mark_collapsed(&mut self, cell: usize) {
        if !self.collapsed[cell] {
            self.collapsed.set(cell, true);
            self.collapsed_count += 1;
        }
    }

    /// Get the number of observed cells.
    pub fn collapsed_count(&self) -> usize {
        self.collapsed_count
    }

    /// Check whether every cell has been observed.
    pub fn fully_collapsed(&self) -> bool {
        self.collapsed_count == self.cells()
    }

    /// Reset every cell to the full domain and clear all bookkeeping.
    pub fn reset(&mut self) {
        for domain in &mut self.domains {
            domain.insert_range(..);
        }
        self.dom_ver.fill(0);
        self.prop_ver.fill(0);
        self.stack.clear();
        self.in_queue.fill(false);
        self.collapsed.fill(false);
        self.collapsed_count = 0;
    }
}
