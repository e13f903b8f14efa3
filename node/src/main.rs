// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # MarketPulse Operator
//!
//! Entry point for the `pulse-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and replays a vault scenario.
//!
//! The binary supports two subcommands:
//!
//! - `simulate`: run a JSON scenario, streaming committed events to stdout
//! - `version` : print build version information

mod cli;
mod logging;
mod metrics;
mod scenario;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Commands, PulseNodeCli};
use logging::LogFormat;
use metrics::VaultMetrics;

fn main() -> Result<()> {
    let cli = PulseNodeCli::parse();

    match cli.command {
        Commands::Simulate(args) => simulate(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the scenario, runs it, and prints the summary.
fn simulate(args: cli::SimulateArgs) -> Result<()> {
    logging::init_logging(&args.log_level, LogFormat::from_str_lossy(&args.log_format))?;

    let scenario = scenario::load_scenario(&args.scenario)?;
    tracing::info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        base = %scenario.base.id,
        quote = %scenario.quote.id,
        "starting simulation"
    );

    let metrics = VaultMetrics::new().context("failed to register metrics")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = scenario::run(&scenario, &mut out, &metrics)?;

    tracing::info!(
        events = report.events,
        failed_steps = report.failed_steps(),
        total_assets = report.total_assets,
        share_supply = report.state.share_supply,
        share_price = report.share_price,
        "simulation finished"
    );

    serde_json::to_writer_pretty(&mut out, &report).context("failed to write report")?;
    writeln!(out)?;

    if args.metrics {
        let text = metrics.encode().context("failed to encode metrics")?;
        out.write_all(text.as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

fn print_version() {
    println!("pulse-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
