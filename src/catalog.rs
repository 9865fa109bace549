use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::direction::Direction;

/// The only persisted catalog format version the loader accepts.
pub const CATALOG_VERSION: u32 = 2;

fn default_weight() -> f64 {
    1.0
}

fn default_tile_size() -> u32 {
    16
}

fn coerce_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        1.0
    }
}

/// One edge matching rule: two tiles may touch when their facing edges share
/// a key. The weight biases neighbour-aware tile selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRule {
    /// Matching key, trimmed and lowercased during normalisation.
    pub key: String,
    /// Rule weight; non-positive values are coerced to 1.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl EdgeRule {
    /// Construct a rule with the default weight.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            weight: 1.0,
        }
    }

    /// Construct a rule with an explicit weight.
    pub fn weighted(key: &str, weight: f64) -> Self {
        Self {
            key: key.to_owned(),
            weight,
        }
    }
}

/// Per-side edge rule lists, in catalog order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Rules for the north side.
    #[serde(default)]
    pub n: Vec<EdgeRule>,
    /// Rules for the east side.
    #[serde(default)]
    pub e: Vec<EdgeRule>,
    /// Rules for the south side.
    #[serde(default)]
    pub s: Vec<EdgeRule>,
    /// Rules for the west side.
    #[serde(default)]
    pub w: Vec<EdgeRule>,
}

impl EdgeSpec {
    /// Get the rule list for one side.
    pub fn side(&self, dir: Direction) -> &[EdgeRule] {
        match dir {
            Direction::North => &self.n,
            Direction::East => &self.e,
            Direction::South => &self.s,
            Direction::West => &self.w,
        }
    }

    fn side_mut(&mut self, dir: Direction) -> &mut Vec<EdgeRule> {
        match dir {
            Direction::North => &mut self.n,
            Direction::East => &mut self.e,
            Direction::South => &mut self.s,
            Direction::West => &mut self.w,
        }
    }
}

/// A base tile definition as persisted in the catalog file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileDef {
    /// Unique, non-empty identifier.
    pub id: String,
    /// Image file reference, forward-slash normalised.
    pub file: String,
    /// Relative placement frequency; non-positive values are coerced to 1.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Edge rules per side; missing sides are empty.
    #[serde(default)]
    pub edges: EdgeSpec,
}

impl TileDef {
    /// Construct a tile with default weight and no edges.
    pub fn new(id: &str, file: &str) -> Self {
        Self {
            id: id.to_owned(),
            file: file.to_owned(),
            weight: 1.0,
            edges: EdgeSpec::default(),
        }
    }

    /// Set the placement weight.
    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Append default-weight rules for the given keys on one side.
    pub fn side(mut self, dir: Direction, keys: &[&str]) -> Self {
        let rules = self.edges.side_mut(dir);
        rules.extend(keys.iter().map(|key| EdgeRule::new(key)));
        self
    }

    /// Append one weighted rule on one side.
    pub fn rule(mut self, dir: Direction, key: &str, weight: f64) -> Self {
        self.edges.side_mut(dir).push(EdgeRule::weighted(key, weight));
        self
    }

    /// Set the same default-weight keys on all four sides.
    pub fn all_sides(self, keys: &[&str]) -> Self {
        self.side(Direction::North, keys)
            .side(Direction::East, keys)
            .side(Direction::South, keys)
            .side(Direction::West, keys)
    }

    /// Produce the canonical form of this tile.
    ///
    /// Keys are trimmed and lowercased, rules with empty keys dropped, the
    /// file path forward-slash normalised and non-positive weights coerced
    /// to 1. Normalisation is idempotent.
    pub fn normalized(&self) -> Self {
        let mut edges = EdgeSpec::default();
        for dir in crate::direction::ALL_DIRECTIONS {
            let rules = edges.side_mut(dir);
            for rule in self.edges.side(dir) {
                let key = rule.key.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                rules.push(EdgeRule {
                    key,
                    weight: coerce_weight(rule.weight),
                });
            }
        }
        Self {
            id: self.id.trim().to_owned(),
            file: self.file.replace('\\', "/"),
            weight: coerce_weight(self.weight),
            edges,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogMeta {
    #[serde(default)]
    version: u32,
    #[serde(default = "default_tile_size")]
    tile_size: u32,
}

impl Default for CatalogMeta {
    fn default() -> Self {
        Self {
            version: 0,
            tile_size: default_tile_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    meta: CatalogMeta,
    #[serde(default)]
    tiles: Vec<TileDef>,
}

/// Result of loading a catalog file.
#[derive(Debug)]
pub struct LoadedCatalog {
    /// Normalised tile definitions; empty when the file was rejected.
    pub tiles: Vec<TileDef>,
    /// Square tile edge length in pixels.
    pub tile_size: u32,
    /// Where a rejected file was moved, when archiving happened.
    pub archived: Option<PathBuf>,
}

impl Default for LoadedCatalog {
    fn default() -> Self {
        Self {
            tiles: Vec::new(),
            tile_size: default_tile_size(),
            archived: None,
        }
    }
}

/// Parse catalog JSON into normalised tiles.
///
/// Returns `None` when the document is malformed or carries the wrong
/// `meta.version`; the caller decides what to do with the bad file.
pub fn parse_catalog(json: &str) -> Option<(Vec<TileDef>, u32)> {
    let doc: CatalogDoc = serde_json::from_str(json).ok()?;
    if doc.meta.version != CATALOG_VERSION {
        return None;
    }
    Some((normalize_tiles(doc.tiles), doc.meta.tile_size))
}

fn normalize_tiles(tiles: Vec<TileDef>) -> Vec<TileDef> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tiles.len());
    for tile in &tiles {
        let tile = tile.normalized();
        if tile.id.is_empty() {
            warn!(file = %tile.file, "dropping tile with empty id");
            continue;
        }
        if !seen.insert(tile.id.clone()) {
            warn!(id = %tile.id, "dropping tile with duplicate id");
            continue;
        }
        out.push(tile);
    }
    out
}

/// Load a tileset catalog from disk.
///
/// A missing file yields an empty catalog. A malformed or wrong-version file
/// also yields an empty catalog, and the offending file is renamed aside
/// with a timestamped suffix so the next save starts clean. This function
/// never returns an error into the engine.
pub fn load_catalog(path: &Path) -> LoadedCatalog {
    let Ok(text) = std::fs::read_to_string(path) else {
        return LoadedCatalog::default();
    };
    match parse_catalog(&text) {
        Some((tiles, tile_size)) => LoadedCatalog {
            tiles,
            tile_size,
            archived: None,
        },
        None => {
            let archived = archive_rejected(path);
            warn!(path = %path.display(), ?archived, "rejected tile catalog");
            LoadedCatalog {
                archived,
                ..LoadedCatalog::default()
            }
        }
    }
}

fn archive_rejected(path: &Path) -> Option<PathBuf> {
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    let mut target = path.as_os_str().to_owned();
    target.push(format!(".{stamp}.rejected"));
    let target = PathBuf::from(target);
    std::fs::rename(path, &target).ok()?;
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_cleans_keys_and_weights() {
        let tile = TileDef::new("grass", "img\\grass.png")
            .weighted(-3.0)
            .rule(Direction::North, "  Grass ", 2.0)
            .rule(Direction::North, "", 1.0)
            .rule(Direction::East, "DIRT", 0.0);
        let norm = tile.normalized();
        assert_eq!(norm.file, "img/grass.png");
        assert_eq!(norm.weight, 1.0);
        assert_eq!(norm.edges.n.len(), 1);
        assert_eq!(norm.edges.n[0].key, "grass");
        assert_eq!(norm.edges.n[0].weight, 2.0);
        assert_eq!(norm.edges.e[0].key, "dirt");
        assert_eq!(norm.edges.e[0].weight, 1.0);
        assert!(norm.edges.s.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let tile = TileDef::new(" road ", "a\\b.png")
            .weighted(0.0)
            .rule(Direction::South, " X ", -1.0);
        let once = tile.normalized();
        assert_eq!(once.normalized(), once);
    }

    #[test]
    fn parse_accepts_version_two_only() {
        let good = r#"{"meta":{"version":2},"tiles":[{"id":"a","file":"a.png"}]}"#;
        let (tiles, tile_size) = parse_catalog(good).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tile_size, 16);

        let wrong = r#"{"meta":{"version":1},"tiles":[{"id":"a","file":"a.png"}]}"#;
        assert!(parse_catalog(wrong).is_none());
        assert!(parse_catalog("{not json").is_none());
    }

    #[test]
    fn parse_ignores_unknown_fields_and_applies_defaults() {
        let json = r#"{
            "meta": {"version": 2, "tileSize": 32, "author": "x"},
            "tiles": [
                {"id": "a", "file": "a.png", "palette": 3,
                 "edges": {"n": [{"key": "G"}]}}
            ],
            "extra": true
        }"#;
        let (tiles, tile_size) = parse_catalog(json).unwrap();
        assert_eq!(tile_size, 32);
        assert_eq!(tiles[0].weight, 1.0);
        assert_eq!(tiles[0].edges.n[0].key, "g");
        assert_eq!(tiles[0].edges.n[0].weight, 1.0);
    }

    #[test]
    fn parse_drops_empty_and_duplicate_ids() {
        let json = r#"{"meta":{"version":2},"tiles":[
            {"id":"", "file":"x.png"},
            {"id":"a", "file":"first.png"},
            {"id":"a", "file":"second.png"}
        ]}"#;
        let (tiles, _) = parse_catalog(json).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].file, "first.png");
    }

    #[test]
    fn load_archives_rejected_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        std::fs::write(&path, r#"{"meta":{"version":7},"tiles":[]}"#).unwrap();

        let loaded = load_catalog(&path);
        assert!(loaded.tiles.is_empty());
        let archived = loaded.archived.expect("bad catalog should be archived");
        assert!(archived.exists());
        assert!(!path.exists());
    }

    #[test]
    fn load_missing_file_is_empty_without_archive() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_catalog(&dir.path().join("absent.json"));
        assert!(loaded.tiles.is_empty());
        assert!(loaded.archived.is_none());
        assert_eq!(loaded.tile_size, 16);
    }
}
