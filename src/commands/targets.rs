use std::path::{Path, PathBuf};

use anyhow::Result;
use dronegrid::{Board, Population, WorldSnapshot, load_config};

use super::render::render_board;
use super::{config_path, merge_obstacles, read_pattern};

pub fn run_targets(pattern_path: &Path, config: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(&config_path(config))?;
    let pattern = read_pattern(pattern_path, &config)?;
    merge_obstacles(&mut config, &pattern.obstacles);
    config.validate()?;

    let dims = config.dims();
    let targets = pattern.targets(dims);

    println!(
        "Pattern {} on a {}x{} board",
        pattern_path.display(),
        dims.width,
        dims.height
    );
    println!(
        "targets={} | obstacles={} | exact-coverage population={}",
        targets.marked().len(),
        config.obstacles.len(),
        targets.coverage_population()
    );
    println!("sentinel={} (padded coordinates)", targets.sentinel());
    for cell in targets.marked() {
        println!(" - {}", cell);
    }

    let board = Board::with_obstacles(config.obstacles.iter().copied());
    let preview = WorldSnapshot::capture(0, dims, &board, &Population::new());
    println!("{}", render_board(&preview, &targets));
    Ok(())
}
