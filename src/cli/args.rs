//! CLI argument definitions using clap
//!
//! Every command opens the ledger named by `--config`, runs one operation,
//! prints one JSON object and closes the ledger.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ledgerdb - event-sourced key ledger
#[derive(Parser, Debug)]
#[command(name = "ledgerdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./ledgerdb.json")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a value for a key
    Put {
        key: String,
        zone: String,
        /// Inline value (UTF-8)
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        value: Option<String>,
        /// Read the value from a file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Read the current value of a key
    Get { key: String },

    /// Delete a key, keeping its history
    Delete { key: String },

    /// List active keys in a zone, newest first
    Scan {
        zone: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Show every event recorded for a key
    History { key: String },

    /// List events within a time window
    Range {
        /// Window start, seconds since epoch
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Window end, seconds since epoch (default: now)
        #[arg(long)]
        end: Option<f64>,
        /// Include superseded events and tombstones
        #[arg(long)]
        all: bool,
    },

    /// Print ledger and cache counters
    Metrics,

    /// Recompute and compare one event's integrity proof
    Audit { event_sequence: i64 },

    /// Record an integrity beacon over events since the last one
    Beacon,

    /// Recompute and compare a beacon's root
    VerifyBeacon { beacon_id: i64 },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
