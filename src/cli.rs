//! Command-line surface for manually driving the engine: feed a desired
//! document, print the resulting reported document, or tick `do_work` a
//! number of times. Grounded in the teacher's `app/cli.rs` `clap::Parser`
//! usage; this core has no TUI, so this is the entire operator surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "device-update-agent")]
#[command(about = "Deployment Workflow Engine core for device-side update agents")]
#[command(version)]
pub struct Cli {
    /// Path to a YAML config file. Falls back to the embedded default.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load any persisted resume record and print the startup report.
    Connect,
    /// Apply a desired-property document (JSON) read from a file, or
    /// stdin if `--file` is omitted, and print the resulting report.
    Apply {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        version: u64,
    },
    /// Tick `do_work` a number of times, printing each report.
    Tick {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}
