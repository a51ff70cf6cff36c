//! Drive a grid with simulated devices and print one JSON summary per tick.
//!
//! ```bash
//! grid-density --width 250 --height 250 --rows 128 --cols 128 --devices 5000 --ticks 10
//! RUST_LOG=grid_density_core=debug grid-density --config grid.json --serial
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grid_density_core::{
    Device, DeviceGenerator, ExecutionConfig, ExecutionContext, GridConfig, GridManager,
    GridSummary, RayonContext, SerialContext, UniformPositions, UpdateTimings,
};

#[derive(Parser, Debug)]
#[command(name = "grid-density")]
#[command(about = "Deposit simulated devices onto a density grid")]
struct Args {
    /// Grid configuration as a JSON file; overrides the size flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Physical width of the grid area
    #[arg(long, default_value_t = 250.0)]
    width: f64,

    /// Physical height of the grid area
    #[arg(long, default_value_t = 250.0)]
    height: f64,

    /// Cells along the width
    #[arg(long, default_value_t = 128)]
    rows: usize,

    /// Cells along the height
    #[arg(long, default_value_t = 128)]
    cols: usize,

    /// Devices generated per tick
    #[arg(long, default_value_t = 1000)]
    devices: usize,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 10)]
    ticks: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 20.0)]
    accuracy_min: f64,

    #[arg(long, default_value_t = 30.0)]
    accuracy_max: f64,

    /// Dedicated worker threads (default: rayon's global pool)
    #[arg(long)]
    threads: Option<usize>,

    /// Devices handed to one worker at a time
    #[arg(long, default_value_t = 4096)]
    partition_size: usize,

    /// Deposit on the calling thread
    #[arg(long)]
    serial: bool,

    /// Report cells whose occupancy exceeds this value
    #[arg(long, default_value_t = 0.5)]
    threshold: f64,
}

#[derive(Serialize)]
struct TickReport {
    tick: usize,
    summary: GridSummary,
    timings: UpdateTimings,
    cells_over_threshold: Vec<(usize, usize)>,
}

fn grid_config(args: &Args) -> Result<GridConfig> {
    match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading grid config {}", path.display()))?;
            GridConfig::from_json_str(&json)
                .with_context(|| format!("parsing grid config {}", path.display()))
        }
        None => {
            let config = GridConfig::new([args.width, args.height], [args.rows, args.cols]);
            config.validate()?;
            Ok(config)
        }
    }
}

fn run<C: ExecutionContext>(args: &Args, config: GridConfig, context: C) -> Result<()> {
    let dimensions = config.dimensions;
    let mut grid = GridManager::try_new(Arc::new(context), config)?;
    info!(
        context = grid.context().name(),
        rows = grid.rows(),
        columns = grid.columns(),
        devices = args.devices,
        ticks = args.ticks,
        "starting simulation"
    );

    let positions = UniformPositions::new(args.devices, dimensions, args.seed)?;
    let generator = DeviceGenerator::seeded(
        positions,
        (args.accuracy_min, args.accuracy_max),
        args.seed.wrapping_add(1),
    )?;

    for (tick, batch) in generator.take(args.ticks).enumerate() {
        let devices: Vec<Device> = batch.into_values().collect();
        let timings = grid.update(&devices)?;
        let threshold = args.threshold;
        let report = TickReport {
            tick,
            summary: grid.summary(),
            timings,
            cells_over_threshold: grid.check_occupation(|v| v > threshold),
        };
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = grid_config(&args)?;

    let execution = ExecutionConfig {
        num_threads: args.threads,
        partition_size: args.partition_size,
    };
    if args.serial {
        execution.validate()?;
        run(&args, config, SerialContext::new(execution.partition_size))
    } else {
        run(&args, config, RayonContext::from_config(&execution)?)
    }
}
