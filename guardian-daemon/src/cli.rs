//! CLI argument parsing.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

/// Errors from CLI argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("duration-sec must be at least 1, got {0}")]
    InvalidDuration(u64),
}

/// Guardian blocks sources of repeated authentication failures.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "guardian")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v shows debug output).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the monitor in the foreground until interrupted.
    Monitor(MonitorArgs),
    /// Validate the configuration and print a summary.
    Check(CheckArgs),
    /// Report currently active blocks.
    Status(StatusArgs),
}

/// Arguments for the monitor command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct MonitorArgs {
    /// Path to the YAML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stop after this many seconds instead of running until SIGINT.
    #[arg(long)]
    pub duration_sec: Option<u64>,
}

impl MonitorArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some(0) = self.duration_sec {
            return Err(CliError::InvalidDuration(0));
        }
        Ok(())
    }
}

/// Arguments for the check command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct CheckArgs {
    /// Path to the YAML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the status command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct StatusArgs {
    /// Path to the YAML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments from an iterator of strings. Useful for testing.
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}
