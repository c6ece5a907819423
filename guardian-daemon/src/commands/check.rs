//! Check command: validate configuration and summarize it.

use std::time::Duration;

use guardian_engine::{Config, Whitelist};

use super::CommandResult;

/// Summary of a validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Names of enabled services.
    pub services: Vec<String>,

    pub failure_threshold: usize,
    pub lookback_duration: Duration,
    pub check_interval: Duration,
    pub block_duration: Duration,
    pub cleanup_interval: Duration,

    /// Exact whitelist entries plus networks.
    pub whitelist_entries: usize,

    /// True when blocks never expire.
    pub permanent_blocks: bool,
}

/// Execute the check command.
pub fn execute_check(config: &Config) -> CommandResult<CheckReport> {
    config.validate()?;

    let whitelist = Whitelist::from_entries(&config.blocking.whitelist)
        .map_err(guardian_engine::ConfigError::from)?;

    Ok(CheckReport {
        services: config.enabled_services().map(|s| s.name.clone()).collect(),
        failure_threshold: config.blocking.failure_threshold,
        lookback_duration: config.monitoring.lookback_duration,
        check_interval: config.monitoring.check_interval,
        block_duration: config.blocking.block_duration,
        cleanup_interval: config.blocking.cleanup_interval,
        whitelist_entries: whitelist.exact_count() + whitelist.network_count(),
        permanent_blocks: config.blocking.is_permanent(),
    })
}
