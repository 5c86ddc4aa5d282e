use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use dronegrid::{
    BrainMode, Cell, Pattern, RunStats, SimConfig, Simulation, TargetCells, default_config_path,
    load_config, save_world_snapshot_tick,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod targets;

use config::{ConfigCommand, run_config};
use render::{print_summary, print_tick, render_board};
use targets::run_targets;

#[derive(Parser)]
#[command(
    name = "dronegrid",
    version,
    about = "Grid drone-swarm simulator (sensors, relay, ticks)",
    long_about = None
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a swarm and advance it tick by tick
    Run(RunArgs),
    /// Inspect or reset the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Parse a target pattern and show what the swarm would be asked to cover
    Targets {
        /// ASCII pattern file ('#' target, 'X' obstacle, '.' empty)
        pattern: PathBuf,
        /// Config file supplying the board size (default: .dronegrid/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Config file (default: .dronegrid/config.json; missing means defaults)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
    /// Board width override
    #[arg(long)]
    x_dim: Option<i32>,
    /// Board height override
    #[arg(long)]
    y_dim: Option<i32>,
    /// Fixed population size (turns off exact coverage)
    #[arg(short = 'n', long)]
    drones: Option<usize>,
    /// Enable dynamic churn (respawn one per tick, periodic culls)
    #[arg(long, action = ArgAction::SetTrue)]
    dynamic: bool,
    /// Ticks between culls in dynamic mode
    #[arg(long)]
    dyn_time: Option<u64>,
    /// Drones removed per cull in dynamic mode
    #[arg(long)]
    dyn_num: Option<usize>,
    /// Respawn at the configured spawn origin instead of a random cell
    #[arg(long, action = ArgAction::SetTrue)]
    one_spawn: bool,
    /// RNG seed for reproducible placement and wandering
    #[arg(long)]
    seed: Option<u64>,
    /// Number of ticks to run
    #[arg(short = 't', long, default_value_t = 20)]
    ticks: u64,
    /// Delay between ticks in milliseconds
    #[arg(short = 'd', long, default_value_t = 0)]
    delay_ms: u64,
    /// Decision logic given to every drone
    #[arg(long, default_value_t = BrainMode::Wander, value_enum)]
    brain: BrainMode,
    /// ASCII target pattern; its 'X' cells are added as obstacles
    #[arg(short = 'p', long)]
    pattern: Option<PathBuf>,
    /// Write a JSON snapshot per tick into this directory
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Do not draw the board each tick
    #[arg(short = 'q', long, action = ArgAction::SetTrue)]
    quiet: bool,
}

pub fn run() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => run_simulation(args),
        Command::Config { command } => run_config(command),
        Command::Targets { pattern, config } => run_targets(&pattern, config),
    }
}

fn config_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(default_config_path)
}

fn read_pattern(path: &Path, config: &SimConfig) -> Result<Pattern> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read pattern {}", path.display()))?;
    let pattern = Pattern::parse(config.dims(), &text)
        .with_context(|| format!("invalid pattern {}", path.display()))?;
    Ok(pattern)
}

fn apply_overrides(config: &mut SimConfig, args: &RunArgs) {
    if let Some(x_dim) = args.x_dim {
        config.x_dim = x_dim;
    }
    if let Some(y_dim) = args.y_dim {
        config.y_dim = y_dim;
    }
    if let Some(drones) = args.drones {
        config.num_drones = drones;
        config.exact_coverage = false;
    }
    if args.dynamic {
        config.dynamic_mode = true;
    }
    if let Some(dyn_time) = args.dyn_time {
        config.dyn_time = dyn_time;
    }
    if let Some(dyn_num) = args.dyn_num {
        config.dyn_num = dyn_num;
    }
    if args.one_spawn {
        config.one_spawn = true;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
}

fn merge_obstacles(config: &mut SimConfig, extra: &[Cell]) {
    for cell in extra {
        if !config.obstacles.contains(cell) {
            config.obstacles.push(*cell);
        }
    }
}

fn run_simulation(args: RunArgs) -> Result<()> {
    let path = config_path(args.config.clone());
    let mut config = load_config(&path)?;
    apply_overrides(&mut config, &args);

    let targets = match args.pattern.as_deref() {
        Some(pattern_path) => {
            let pattern = read_pattern(pattern_path, &config)?;
            merge_obstacles(&mut config, &pattern.obstacles);
            info!(
                targets = pattern.marked.len(),
                obstacles = pattern.obstacles.len(),
                "loaded pattern {}",
                pattern_path.display()
            );
            pattern.targets(config.dims())
        }
        None => TargetCells::from_marked(config.dims(), []),
    };
    if config.exact_coverage && targets.marked().is_empty() {
        warn!("exact coverage without marked targets builds no drones; pass --pattern or --drones");
    }

    let factory = args.brain.factory(config.seed);
    let dynamic = config.dynamic_mode;
    let mut sim = Simulation::new(config, targets, factory)?;

    let mut stats = RunStats::default();
    stats.record_all(sim.events());

    if !args.quiet {
        println!("Tick 0 | drones={}", sim.population().len());
        println!("{}", render_board(&sim.snapshot(), sim.targets()));
    }
    if let Some(dir) = args.snapshot_dir.as_deref() {
        save_world_snapshot_tick(dir, &sim.snapshot().stamped())
            .with_context(|| format!("failed to write snapshot into {}", dir.display()))?;
    }

    let delay = Duration::from_millis(args.delay_ms);
    for _ in 0..args.ticks {
        let result = sim.step()?;
        stats.record_all(&result.events);
        let snapshot = sim.snapshot();

        if !args.quiet {
            print_tick(&result);
            println!("{}", render_board(&snapshot, sim.targets()));
        }
        if let Some(dir) = args.snapshot_dir.as_deref() {
            save_world_snapshot_tick(dir, &snapshot.stamped())
                .with_context(|| format!("failed to write snapshot into {}", dir.display()))?;
        }

        if sim.population().is_empty() && !dynamic {
            info!(tick = result.tick, "every drone is gone; stopping");
            break;
        }
        if delay > Duration::ZERO {
            std::thread::sleep(delay);
        }
    }

    print_summary(&stats, sim.population().len(), sim.target_population());
    Ok(())
}
