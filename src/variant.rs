use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::catalog::{EdgeRule, TileDef};
use crate::direction::Direction;

/// Edge keys of one variant side, mapped to the strongest rule weight seen
/// for each key. Ordered so weighted-score accumulation is deterministic.
pub type EdgeMap = BTreeMap<String, f64>;

/// A concrete placeable unit: a base tile plus a fixed clockwise rotation.
#[derive(Clone, Debug)]
pub struct Variant {
    id: String,
    file: String,
    rotation: u8,
    weight: f64,
    sides: [EdgeMap; 4],
}

impl Variant {
    /// Get the base tile identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the image file reference.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Get the number of 90° clockwise turns applied to the base tile.
    pub fn rotation(&self) -> u8 {
        self.rotation
    }

    /// Get the placement weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Get the edge key map for one side.
    pub fn side(&self, dir: Direction) -> &EdgeMap {
        &self.sides[dir.index()]
    }
}

/// The ordered variant catalog.
///
/// Positions in this list define the bit indices used by every domain and
/// compatibility mask downstream, so the ordering is part of the engine's
/// observable identity.
#[derive(Clone, Debug, Default)]
pub struct VariantSet {
    variants: Vec<Variant>,
}

impl VariantSet {
    /// Expand base tiles into the variant catalog.
    ///
    /// With rotation disabled each tile yields exactly one variant. With it
    /// enabled, all four 90° clockwise rotations are generated, but
    /// `(file, edges)` duplicates are suppressed so symmetric tiles do not
    /// inflate the catalog. Earliest occurrence wins; ordering is stable.
    pub fn build(tiles: &[TileDef], allow_rotate: bool) -> Self {
        let rotations = if allow_rotate { 4 } else { 1 };
        let mut variants = Vec::new();
        let mut seen = HashSet::new();
        for tile in tiles {
            let tile = tile.normalized();
            let mut sides = base_sides(&tile);
            for rotation in 0..rotations {
                if rotation > 0 {
                    sides = rotate_cw(&sides);
                }
                let maps = side_maps(&sides);
                if seen.insert(fingerprint(&tile.file, &maps)) {
                    variants.push(Variant {
                        id: tile.id.clone(),
                        file: tile.file.clone(),
                        rotation,
                        weight: tile.weight,
                        sides: maps,
                    });
                }
            }
        }
        Self { variants }
    }

    /// Get the number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Check whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Get a variant by index.
    pub fn get(&self, index: usize) -> &Variant {
        &self.variants[index]
    }

    /// Get the placement weight of a variant.
    pub fn weight(&self, index: usize) -> f64 {
        self.variants[index].weight
    }

    /// Get the edge key map of one variant side.
    pub fn side(&self, index: usize, dir: Direction) -> &EdgeMap {
        self.variants[index].side(dir)
    }

    /// Iterate over the variants in bit-index order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }
}

fn base_sides(tile: &TileDef) -> [Vec<EdgeRule>; 4] {
    [
        tile.edges.n.clone(),
        tile.edges.e.clone(),
        tile.edges.s.clone(),
        tile.edges.w.clone(),
    ]
}

// After one 90° clockwise turn the new north edge is the old west edge,
// and so on around: N←W, E←N, S←E, W←S.
fn rotate_cw(sides: &[Vec<EdgeRule>; 4]) -> [Vec<EdgeRule>; 4] {
    [
        sides[3].clone(),
        sides[0].clone(),
        sides[1].clone(),
        sides[2].clone(),
    ]
}

fn side_maps(sides: &[Vec<EdgeRule>; 4]) -> [EdgeMap; 4] {
    [
        side_map(&sides[0]),
        side_map(&sides[1]),
        side_map(&sides[2]),
        side_map(&sides[3]),
    ]
}

// Duplicate keys on a side keep the maximum weight seen.
fn side_map(rules: &[EdgeRule]) -> EdgeMap {
    let mut map = EdgeMap::new();
    for rule in rules {
        let weight = map.entry(rule.key.clone()).or_insert(rule.weight);
        if rule.weight > *weight {
            *weight = rule.weight;
        }
    }
    map
}

fn fingerprint(file: &str, sides: &[EdgeMap; 4]) -> String {
    let mut key = String::from(file);
    for side in sides {
        key.push('|');
        for (edge, weight) in side {
            let _ = write!(key, "{edge}:{weight};");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::ALL_DIRECTIONS;

    fn asymmetric_tile() -> TileDef {
        TileDef::new("path", "path.png")
            .side(Direction::North, &["a"])
            .side(Direction::East, &["b"])
            .side(Direction::South, &["c"])
            .side(Direction::West, &["d"])
    }

    #[test]
    fn no_rotation_yields_one_variant_per_tile() {
        let tiles = vec![asymmetric_tile(), TileDef::new("x", "x.png").all_sides(&["k"])];
        let set = VariantSet::build(&tiles, false);
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|v| v.rotation() == 0));
    }

    #[test]
    fn rotation_expands_asymmetric_tiles_fourfold() {
        let set = VariantSet::build(&[asymmetric_tile()], true);
        assert_eq!(set.len(), 4);
        let rotations: Vec<u8> = set.iter().map(Variant::rotation).collect();
        assert_eq!(rotations, vec![0, 1, 2, 3]);
    }

    #[test]
    fn rotation_maps_west_to_north() {
        let set = VariantSet::build(&[asymmetric_tile()], true);
        let once = set.get(1);
        assert!(once.side(Direction::North).contains_key("d"));
        assert!(once.side(Direction::East).contains_key("a"));
        assert!(once.side(Direction::South).contains_key("b"));
        assert!(once.side(Direction::West).contains_key("c"));
    }

    #[test]
    fn symmetric_tiles_deduplicate_under_rotation() {
        let tile = TileDef::new("grass", "grass.png").all_sides(&["g"]);
        let rotated = VariantSet::build(&[tile.clone()], true);
        let flat = VariantSet::build(&[tile], false);
        assert_eq!(rotated.len(), flat.len());
        assert_eq!(rotated.len(), 1);
    }

    #[test]
    fn duplicate_keys_keep_the_maximum_weight() {
        let tile = TileDef::new("r", "r.png")
            .rule(Direction::North, "g", 2.0)
            .rule(Direction::North, "g", 5.0)
            .rule(Direction::North, "g", 3.0);
        let set = VariantSet::build(&[tile], false);
        assert_eq!(set.side(0, Direction::North).get("g"), Some(&5.0));
    }

    #[test]
    fn ordering_is_first_generated_wins() {
        let tiles = vec![
            TileDef::new("a", "a.png").all_sides(&["k"]),
            TileDef::new("b", "b.png").all_sides(&["k"]),
        ];
        let set = VariantSet::build(&tiles, true);
        assert_eq!(set.get(0).id(), "a");
        assert_eq!(set.get(1).id(), "b");
        for dir in ALL_DIRECTIONS {
            assert!(set.side(0, dir).contains_key("k"));
        }
    }
}
