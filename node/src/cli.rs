//! # CLI Interface
//!
//! Defines the command-line argument structure for `pulse-node` using
//! `clap` derive. Two subcommands: `simulate` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MarketPulse vault operator.
///
/// Runs vault scenarios against an in-memory ledger and pool, printing the
/// committed event stream and, optionally, Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "pulse-node",
    about = "MarketPulse liquidity vault operator",
    version,
    propagate_version = true
)]
pub struct PulseNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the operator binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a JSON scenario against a fresh in-memory host.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to the scenario file (JSON).
    #[arg(long, short = 's', env = "PULSE_SCENARIO")]
    pub scenario: PathBuf,

    /// Log output format: `pretty` or `json`.
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(
        long,
        env = "PULSE_LOG",
        default_value = "pulse_node=info,pulse_contracts=info,pulse_protocol=warn"
    )]
    pub log_level: String,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        PulseNodeCli::command().debug_assert();
    }

    #[test]
    fn simulate_parses_flags() {
        let cli = PulseNodeCli::parse_from([
            "pulse-node",
            "simulate",
            "--scenario",
            "demo.json",
            "--log-format",
            "json",
            "--metrics",
        ]);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.scenario, PathBuf::from("demo.json"));
                assert_eq!(args.log_format, "json");
                assert!(args.metrics);
            }
            Commands::Version => panic!("expected simulate"),
        }
    }
}
