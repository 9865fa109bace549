use fixedbitset::FixedBitSet;

use crate::direction::{ALL_DIRECTIONS, Direction};
use crate::variant::{EdgeMap, VariantSet};

/// The four-way adjacency table over the variant catalog.
///
/// `masks()[a][d]` holds every variant allowed to sit on the `d` side of
/// variant `a`. Built once at engine construction and immutable afterwards;
/// the build is O(|V|² · 4), which is fine because the catalog is tiny
/// compared to the grid.
#[derive(Clone, Debug)]
pub struct CompatTable {
    masks: Vec<[FixedBitSet; 4]>,
}

impl CompatTable {
    /// Build the table from pairwise facing-edge key intersection.
    pub fn build(variants: &VariantSet) -> Self {
        let len = variants.len();
        let mut masks: Vec<[FixedBitSet; 4]> = (0..len)
            .map(|_| std::array::from_fn(|_| FixedBitSet::with_capacity(len)))
            .collect();
        for a in 0..len {
            for b in 0..len {
                for dir in ALL_DIRECTIONS {
                    let facing = variants.side(b, dir.opposite());
                    if shares_key(variants.side(a, dir), facing) {
                        masks[a][dir.index()].insert(b);
                    }
                }
            }
        }
        Self { masks }
    }

    /// Get the per-variant direction masks.
    pub fn masks(&self) -> &[[FixedBitSet; 4]] {
        &self.masks
    }

    /// Check whether `b` may sit on the `dir` side of `a`.
    pub fn allows(&self, a: usize, dir: Direction, b: usize) -> bool {
        self.masks[a][dir.index()].contains(b)
    }

    /// Get the number of variants covered by the table.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Check whether the table covers no variants.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

// An empty key set on either side makes the pair incompatible.
fn shares_key(a: &EdgeMap, b: &EdgeMap) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.keys().any(|key| large.contains_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TileDef;

    fn sample_set() -> VariantSet {
        let tiles = vec![
            TileDef::new("grass", "grass.png").all_sides(&["g"]),
            TileDef::new("shore", "shore.png")
                .side(Direction::North, &["g"])
                .side(Direction::East, &["g", "w"])
                .side(Direction::South, &["w"])
                .side(Direction::West, &["g", "w"]),
            TileDef::new("water", "water.png").all_sides(&["w"]),
        ];
        VariantSet::build(&tiles, true)
    }

    #[test]
    fn symmetry_holds_for_every_pair() {
        let variants = sample_set();
        let table = CompatTable::build(&variants);
        for a in 0..table.len() {
            for b in 0..table.len() {
                for dir in ALL_DIRECTIONS {
                    assert_eq!(
                        table.allows(a, dir, b),
                        table.allows(b, dir.opposite(), a),
                        "asymmetry at a={a} b={b} {dir:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn facing_keys_decide_compatibility() {
        let tiles = vec![
            TileDef::new("grass", "grass.png").all_sides(&["g"]),
            TileDef::new("water", "water.png").all_sides(&["w"]),
        ];
        let table = CompatTable::build(&VariantSet::build(&tiles, false));
        for dir in ALL_DIRECTIONS {
            assert!(table.allows(0, dir, 0));
            assert!(table.allows(1, dir, 1));
            assert!(!table.allows(0, dir, 1));
            assert!(!table.allows(1, dir, 0));
        }
    }

    #[test]
    fn empty_sides_block_all_neighbours() {
        let tiles = vec![
            TileDef::new("cap", "cap.png").side(Direction::North, &["x"]),
            TileDef::new("base", "base.png").side(Direction::South, &["x"]),
        ];
        let table = CompatTable::build(&VariantSet::build(&tiles, false));
        // The one facing pair with shared keys: base sits north of cap.
        assert!(table.allows(0, Direction::North, 1));
        assert!(table.allows(1, Direction::South, 0));
        assert!(!table.allows(0, Direction::South, 1));
        assert!(!table.allows(0, Direction::East, 1));
        assert!(!table.allows(0, Direction::East, 0));
    }
}
