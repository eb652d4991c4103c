//! # VVB Bench Binary
//!
//! Assembles the full virtual vehicle rig and runs a scripted scenario
//! against it, optionally exporting the bus log for report generation.
//!
//! # Usage
//!
//! ```bash
//! # Plain drive with the default configuration
//! vvb_bench
//!
//! # AEB scenario from a config file, with the bus log exported
//! vvb_bench --config bench.toml --scenario aeb --export-log run.json
//!
//! # Verbose logging
//! vvb_bench -s split-mu -v
//! ```

#![deny(warnings)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vvb_bench::scenario::{run_scenario, Scenario};
use vvb_bench::{export_log, Rig};
use vvb_common::config::{BenchConfig, ConfigError, ConfigLoader, LogLevel};
use vvb_ecus::BodyEcu;

/// VVB Bench - software-in-the-loop virtual vehicle test bench
#[derive(Parser, Debug)]
#[command(name = "vvb_bench")]
#[command(version)]
#[command(about = "Deterministic SIL test bench for virtual vehicle scenarios")]
struct Args {
    /// Path to the bench configuration file (bench.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scenario to run
    #[arg(short, long, value_enum, default_value = "drive")]
    scenario: Scenario,

    /// Run duration in simulated seconds (overrides the config)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Export the bus log as JSON after the run
    #[arg(long)]
    export_log: Option<PathBuf>,

    /// Enable verbose logging regardless of the configured level
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("vvb_bench: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, used_defaults) = load_config(&args)?;
    config.validate()?;
    setup_tracing(&args, config.bench.log_level)?;

    info!("VVB Bench v{} starting", env!("CARGO_PKG_VERSION"));
    if used_defaults {
        info!("no bench.toml found, using built-in defaults");
    }

    let duration = args.duration.unwrap_or(config.bench.duration);
    let mut rig = Rig::build(&config)?;

    // Ctrl-C requests a stop at the next tick boundary.
    let stop = rig.engine.stop_handle();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        stop.store(true, Ordering::Relaxed);
    })?;

    let summary = run_scenario(&mut rig, args.scenario, duration)?;

    info!(
        ticks = summary.ticks,
        final_speed = format!("{:.2}", summary.final_speed),
        max_yaw_rate = format!("{:.3}", summary.max_yaw_rate),
        aeb_triggered = summary.aeb_triggered,
        "scenario complete"
    );
    if let Some(dist) = summary.min_obstacle_distance {
        info!(min_obstacle_distance = format!("{:.1}", dist), "closest approach");
    }

    // Persist the odometer before shutdown.
    let body = rig.nodes.body;
    rig.engine
        .bus_mut()
        .with_node(body, |node, _bus| {
            node.as_any()
                .downcast_ref::<BodyEcu>()
                .expect("body slot")
                .save_to_nvm()
        })??;

    if let Some(path) = &args.export_log {
        export_log(rig.engine.bus(), path)?;
    }

    info!("VVB Bench shutdown complete");
    Ok(())
}

/// Load the configuration file. Without an explicit path, a missing
/// `bench.toml` falls back to the built-in defaults.
fn load_config(args: &Args) -> Result<(BenchConfig, bool), ConfigError> {
    match &args.config {
        Some(path) => Ok((BenchConfig::load(path)?, false)),
        None => match BenchConfig::load(&PathBuf::from("bench.toml")) {
            Ok(config) => Ok((config, false)),
            Err(ConfigError::FileNotFound) => Ok((BenchConfig::default(), true)),
            Err(e) => Err(e),
        },
    }
}

/// Setup the tracing subscriber: configured level, `--verbose`
/// overriding, `RUST_LOG` on top of both.
fn setup_tracing(args: &Args, config_level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let directive = if args.verbose {
        "debug".parse()?
    } else {
        config_level.as_filter().parse()?
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
