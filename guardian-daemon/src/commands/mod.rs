//! Command orchestration for CLI subcommands.

pub mod check;
pub mod monitor;
pub mod status;

use std::path::{Path, PathBuf};

use guardian_engine::{Config, ConfigError, FirewallError};
use thiserror::Error;

use crate::cli::CliError;

pub use check::{execute_check, CheckReport};
pub use monitor::{execute_monitor, MonitorReport};
pub use status::{execute_status, StatusReport};

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read configuration file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("firewall error: {0}")]
    Firewall(#[from] FirewallError),
}

/// Result of command execution.
pub type CommandResult<T> = Result<T, CommandError>;

/// Load and validate configuration.
///
/// With no path, built-in defaults are used. Any parse or validation problem
/// is fatal: the daemon refuses to start on a bad configuration.
pub fn load_config(path: Option<&Path>) -> CommandResult<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|source| {
                CommandError::ReadConfig {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            Config::from_yaml(&content)?
        }
        None => Config::default(),
    };

    config.validate()?;
    Ok(config)
}
