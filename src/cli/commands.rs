//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// extractkit CLI
#[derive(Parser, Debug)]
#[command(name = "extractkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Extractor definition file (YAML)
    #[arg(short, long, global = true)]
    pub extractor: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an extractor and print its messages
    Run {
        /// Input URL matched against the extractor pattern
        url: Option<String>,

        /// Inline config JSON
        #[arg(long)]
        config_json: Option<String>,

        /// Continue from a cursor printed by an earlier run
        #[arg(long)]
        cursor: Option<String>,

        /// Stop after this many url/queue messages
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Validate extractor definition
    Validate,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
