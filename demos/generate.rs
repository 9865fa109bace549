use anyhow::{Context, bail, ensure};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tilewave::{Direction, Engine, EngineOptions, Event, MacroConfig, TileDef, load_catalog};

/// Map generation configuration.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Config {
    #[arg(short, long, default_value_t = 64)]
    width: usize,

    #[arg(short = 'H', long, default_value_t = 32)]
    height: usize,

    #[arg(short, long, default_value_t = 12345)]
    seed: u32,

    /// JSON tileset catalog; a built-in terrain catalog is used when absent.
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    #[arg(short, long, default_value_t = 10)]
    restarts: u32,

    /// Expand the catalog with rotation variants.
    #[arg(long)]
    rotate: bool,

    /// Pre-seed large grass continents.
    #[arg(long)]
    continents: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn sample_tiles() -> Vec<TileDef> {
    vec![
        TileDef::new("gg-grass", "grass.png")
            .weighted(6.0)
            .all_sides(&["grass"]),
        TileDef::new("water", "water.png")
            .weighted(4.0)
            .all_sides(&["water"]),
        TileDef::new("sand", "sand.png")
            .all_sides(&["grass", "water", "sand"]),
        TileDef::new("g-forest", "forest.png")
            .weighted(2.0)
            .all_sides(&["grass"])
            .rule(Direction::North, "forest", 2.0)
            .rule(Direction::East, "forest", 2.0)
            .rule(Direction::South, "forest", 2.0)
            .rule(Direction::West, "forest", 2.0),
    ]
}

fn glyph(tiles: &[TileDef], variant_file: &str) -> char {
    tiles
        .iter()
        .find(|tile| tile.file == variant_file)
        .and_then(|tile| tile.id.chars().next_back())
        .unwrap_or('?')
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    let tiles = match &config.catalog {
        Some(path) => {
            let loaded = load_catalog(path);
            ensure!(
                !loaded.tiles.is_empty(),
                "catalog {} had no usable tiles",
                path.display()
            );
            loaded.tiles
        }
        None => sample_tiles(),
    };
    if config.verbose {
        println!("Grid       : {}x{}", config.width, config.height);
        println!("Seed       : {}", config.seed);
        println!("Base tiles : {}", tiles.len());
    }

    let opts = EngineOptions {
        seed: config.seed,
        max_restarts: config.restarts,
        allow_rotate: config.rotate,
        macro_grass: config.continents.then(MacroConfig::default),
    };
    let mut engine =
        Engine::new(&tiles, config.width, config.height, opts).context("engine construction")?;
    if config.verbose {
        println!("Variants   : {}", engine.num_variants());
    }

    let pb = ProgressBar::new(engine.cells() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} cells")
            .unwrap()
            .progress_chars("##-"),
    );

    'generation: loop {
        for event in engine.step(64) {
            match event {
                Event::Done => break 'generation,
                Event::Error { message } => {
                    pb.finish_and_clear();
                    bail!("{message}");
                }
                Event::Restart { attempt } => pb.set_message(format!("restarts: {attempt}")),
                Event::Collapse { .. } | Event::Progress { .. } => {}
            }
        }
        pb.set_position(engine.collapsed_count() as u64);
    }
    pb.finish_and_clear();

    let map = engine.collapsed_map();
    for row in map.rows() {
        let line: String = row
            .iter()
            .map(|cell| match cell {
                Some(variant) => glyph(&tiles, engine.variants().get(*variant).file()),
                None => ' ',
            })
            .collect();
        println!("{line}");
    }
    Ok(())
}
