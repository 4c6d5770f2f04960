//! vsurf-sim - scroll simulator for the tile cache
//!
//! ```text
//! vsurf-sim --frames 600 --step 24 --config surface.json
//! RUST_LOG=vsurf_engine=debug vsurf-sim --horizontal
//! ```

mod sim;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vsurf_engine::SurfaceConfig;

use crate::sim::{SimOptions, Simulation};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "vsurf-sim", version, about = "Scroll a virtual surface and report tile usage")]
struct Args {
    /// JSON file with a SurfaceConfig; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Surface width in pixels
    #[arg(long, default_value_t = 2048)]
    width: i32,

    /// Surface height in pixels
    #[arg(long, default_value_t = 16384)]
    height: i32,

    #[arg(long, default_value_t = 800)]
    view_width: i32,

    #[arg(long, default_value_t = 600)]
    view_height: i32,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u32,

    /// Pixels scrolled per frame
    #[arg(short, long, default_value_t = 24)]
    step: i32,

    /// Scroll along x instead of y
    #[arg(long)]
    horizontal: bool,

    /// Surfaces scrolling side by side
    #[arg(long, default_value_t = 1)]
    surfaces: usize,

    /// Milliseconds between frames
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Standby budget in KiB, shared by all surfaces
    #[arg(long, default_value_t = 16 * 1024)]
    budget_kib: u64,

    /// Override tile_size
    #[arg(long)]
    tile_size: Option<i32>,

    /// Override max_tile_count
    #[arg(long)]
    max_tiles: Option<usize>,

    /// Override eviction_ceiling_ms
    #[arg(long)]
    ceiling_ms: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging when RUST_LOG is unset
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn surface_config(&self) -> Result<SurfaceConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => SurfaceConfig::default(),
        };

        if let Some(tile_size) = self.tile_size {
            config.tile_size = tile_size;
        }
        if let Some(max_tiles) = self.max_tiles {
            config.max_tile_count = max_tiles;
        }
        if let Some(ceiling_ms) = self.ceiling_ms {
            config.eviction_ceiling_ms = ceiling_ms;
        }
        config.validate().context("invalid surface config")?;
        Ok(config)
    }

    fn sim_options(&self) -> SimOptions {
        SimOptions {
            width: self.width,
            height: self.height,
            view_width: self.view_width,
            view_height: self.view_height,
            frames: self.frames,
            step: self.step,
            horizontal: self.horizontal,
            surfaces: self.surfaces,
            frame_ms: self.frame_ms,
            standby_budget: self.budget_kib * 1024,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.surface_config()?;
    let options = args.sim_options();
    tracing::info!(
        version = vsurf_engine::VERSION,
        width = options.width,
        height = options.height,
        surfaces = options.surfaces,
        frames = options.frames,
        "starting simulation"
    );

    let report = Simulation::new(config, options)
        .context("creating surfaces")?
        .run()
        .context("running simulation")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("frames:            {}", report.frames);
    println!("extra frames:      {}", report.additional_frames);
    println!("callbacks:         {}", report.callbacks);
    println!("rects drawn:       {}", report.rects_drawn);
    println!("tiles created:     {}", report.tiles_created);
    println!(
        "tiles freed:       {} ({} from standby budget)",
        report.tiles_freed, report.standby_freed
    );
    println!("peak tile count:   {}", report.peak_tile_count);
    println!("peak tile memory:  {} KiB", report.peak_allocated_bytes / 1024);
    println!("degraded frames:   {}", report.degraded_frames);
    if report.leaked_allocations > 0 {
        tracing::warn!(leaked = report.leaked_allocations, "allocations outlived their surfaces");
    }
    Ok(())
}
