//! # h2o
//!
//! Runs the molecule rendezvous: `NO` oxygen and `NH` hydrogen threads pair
//! up into water molecules, and every step is written to a numbered event
//! log.
//!
//! ## Example
//!
//! ```bash
//! # 3 oxygen, 5 hydrogen, startup delay up to 100ms, creation up to 50ms
//! h2o 3 5 100 50
//!
//! # Reproducible delays, custom log file, summary on stdout
//! h2o 3 5 100 50 --seed 7 --output run.out --summary
//! ```
//!
//! Diagnostics go to stderr and are controlled by `RUST_LOG`, falling back
//! to `[log] filter` from the config file (default `warn`).

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::LineWriter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use h2o_core::{EventLog, Reactor, RunParams, RunSummary};

mod config;

use config::{FileConfig, Settings};

/// Combine oxygen and hydrogen threads into water molecules.
#[derive(Parser, Debug)]
#[command(name = "h2o")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of oxygen units
    #[arg(value_name = "NO")]
    oxygen: u32,

    /// Number of hydrogen units
    #[arg(value_name = "NH")]
    hydrogen: u32,

    /// Maximum startup delay of a unit, in milliseconds (0-1000)
    #[arg(value_name = "TI")]
    max_startup_delay: u32,

    /// Maximum time to create a molecule, in milliseconds (0-1000)
    #[arg(value_name = "TB")]
    max_creation_delay: u32,

    /// Event log file (default: proj2.out)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Seed for reproducible delays
    #[arg(long)]
    seed: Option<u64>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a summary of the run to stdout
    #[arg(long, conflicts_with = "json")]
    summary: bool,

    /// Print the summary as JSON to stdout
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(file_config, cli.output.clone(), cli.seed);

    init_tracing(&settings.log_filter);

    let params = RunParams::new(
        cli.oxygen,
        cli.hydrogen,
        cli.max_startup_delay,
        cli.max_creation_delay,
    )
    .context("Invalid arguments")?;

    let file = File::create(&settings.output)
        .with_context(|| format!("Failed to open event log {}", settings.output.display()))?;
    let log = EventLog::new(LineWriter::new(file));

    let mut reactor = Reactor::new(params, log);
    if let Some(seed) = settings.seed {
        reactor = reactor.with_seed(seed);
    }
    tracing::debug!(
        output = %settings.output.display(),
        seed = ?settings.seed,
        params = ?reactor.params(),
        "Resolved settings"
    );

    let summary = reactor.run().context("Run failed")?;
    tracing::info!(
        output = %settings.output.display(),
        molecules = summary.molecules,
        "Event log written"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if cli.summary {
        print_summary(&summary);
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(summary: &RunSummary) {
    println!("Molecules:         {}", summary.molecules);
    println!("Oxygen consumed:   {}", summary.oxygen_consumed);
    println!("Hydrogen consumed: {}", summary.hydrogen_consumed);
    println!(
        "Rejected:          {} O, {} H",
        summary.rejected_oxygen, summary.rejected_hydrogen
    );
}
