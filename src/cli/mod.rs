//! CLI module
//!
//! Command-line interface for running extractors.
//!
//! # Commands
//!
//! - `run` - Run an extractor, printing one message per line
//! - `validate` - Check an extractor definition

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
