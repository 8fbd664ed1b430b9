// Room Simulation Runner
// Runs the room scenario to its end time, printing the gateway map to
// stderr once per simulated second and a closing summary to stdout.
//
// Usage:
//   cargo run --release --bin room                         # Canonical preset, seed 0
//   cargo run --release --bin room -- --seed 42 --parallel # Worker pool
//   cargo run --release --bin room -- --preset draft-b     # Earlier parameter set
//   cargo run --release --bin room -- --config sim.json    # Scheduler settings from JSON
//   cargo run --release --bin room -- --summary out.json   # Also write the summary as JSON

mod summary;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use room_engine::room::{self, GatewayLogger, RoomParams};
use room_engine::SimConfig;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Canonical,
    DraftA,
    DraftB,
}

impl Preset {
    fn params(self) -> RoomParams {
        match self {
            Preset::Canonical => RoomParams::canonical(),
            Preset::DraftA => RoomParams::draft_a(),
            Preset::DraftB => RoomParams::draft_b(),
        }
    }
}

#[derive(Parser)]
#[command(name = "room")]
#[command(version)]
#[command(about = "Field-calculus simulation of satisfaction in a heated room")]
struct Cli {
    /// Global random seed
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Simulated end time (defaults to the preset's)
    #[arg(long)]
    end_time: Option<f64>,

    /// Scenario parameter set
    #[arg(long, value_enum, default_value = "canonical")]
    preset: Preset,

    /// Execute same-instant rounds on the worker pool
    #[arg(long)]
    parallel: bool,

    /// Scheduler configuration as JSON, replacing the preset's
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not print the gateway map
    #[arg(long)]
    no_map: bool,

    /// Write the closing summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli, params: &RoomParams) -> Result<SimConfig, String> {
    match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            SimConfig::from_json(&text).map_err(|e| format!("{}: {}", path.display(), e))
        }
        None => Ok(params.sim_config(cli.seed, cli.parallel)),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut params = cli.preset.params();
    if let Some(end) = cli.end_time {
        params.end_time = end;
    }
    let config = match load_config(&cli, &params) {
        Ok(mut config) => {
            if let Some(end) = cli.end_time {
                config.end_time = end;
            }
            config
        }
        Err(msg) => {
            error!("{}", msg);
            std::process::exit(2);
        }
    };

    let mut sim = match room::build(params.clone(), config) {
        Ok(sim) => sim,
        Err(err) => {
            error!(%err, "invalid simulation setup");
            std::process::exit(1);
        }
    };
    if !cli.no_map {
        sim.add_aggregator(GatewayLogger::stderr(&params));
    }

    info!(preset = ?cli.preset, seed = cli.seed, "running room simulation");
    let started = Instant::now();
    sim.run();
    let elapsed = started.elapsed();

    let report = summary::RunSummary::collect(&sim, format!("{:?}", cli.preset), elapsed);
    report.print();

    if let Some(path) = &cli.summary {
        if let Err(err) = report.write_json(path) {
            error!(%err, path = %path.display(), "failed to write summary");
            std::process::exit(1);
        }
        println!("\n  Summary written to {}", path.display());
    }
}
