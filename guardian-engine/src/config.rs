//! Daemon configuration.
//!
//! Configuration is YAML with Go-style duration strings (`30s`, `5m`, `1h`).
//! `Config::from_yaml` parses from a string; validation is a separate step so
//! callers can report every problem as a startup failure (exit code 2).

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use guardian_clock::format::rule_timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{Whitelist, WhitelistError};

/// Application name substituted for the `{app}` placeholder.
pub const APP_NAME: &str = "Guardian";

/// Default firewall rule name template.
pub const DEFAULT_RULE_NAME_TEMPLATE: &str = "Guardian - {timestamp} - {ip}";

/// Default tag substring embedded in rule descriptions.
pub const DEFAULT_RULE_TAG: &str = "Guardian";

/// Default cap on records per event-log query.
pub const DEFAULT_MAX_EVENTS_PER_QUERY: usize = 50;

/// Errors from configuration parsing and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failure_threshold must be at least 1")]
    InvalidThreshold,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("max_events_per_query must be at least 1")]
    InvalidMaxEvents,

    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error("rule_name_template must not be empty")]
    EmptyTemplate,

    #[error("rule_tag must not be empty")]
    EmptyTag,

    #[error("no enabled services configured")]
    NoServices,
}

/// Complete daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub blocking: BlockingConfig,

    #[serde(default = "default_services")]
    pub services: Vec<ServiceConfig>,
}

/// Scan-loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Trailing duration inside which failures count toward the threshold.
    #[serde(with = "duration_str")]
    pub lookback_duration: Duration,

    /// How often each scanner queries its event source.
    #[serde(with = "duration_str")]
    pub check_interval: Duration,

    /// Cap on records returned by one event-log query.
    #[serde(default = "default_max_events")]
    pub max_events_per_query: usize,
}

/// Blocking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Per-IP failure count, within one lookback window, that triggers a block.
    pub failure_threshold: usize,

    /// How long a block stays in force. Zero means permanent.
    #[serde(with = "duration_str")]
    pub block_duration: Duration,

    /// How often the sweeper scans for expired blocks.
    #[serde(with = "duration_str")]
    pub cleanup_interval: Duration,

    /// Addresses never blocked: exact IPs and CIDR networks.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Rule name template. Placeholders: `{app}`, `{ip}`, `{service}`,
    /// `{timestamp}` (`YYYYMMDDHHMMSS`, UTC).
    #[serde(default = "default_template")]
    pub rule_name_template: String,

    /// Substring embedded in every rule description so the daemon can
    /// recognize its own rules after a restart.
    #[serde(default = "default_tag")]
    pub rule_tag: String,
}

/// One monitored service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Symbolic name, e.g. `RDP`.
    pub name: String,

    /// Log channel to query, e.g. `Security`.
    pub log_channel: String,

    /// Event ID identifying a failure, e.g. `4625`.
    pub event_selector: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            lookback_duration: Duration::from_secs(10 * 60),
            check_interval: Duration::from_secs(5),
            max_events_per_query: DEFAULT_MAX_EVENTS_PER_QUERY,
        }
    }
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            block_duration: Duration::from_secs(2 * 60),
            cleanup_interval: Duration::from_secs(30),
            whitelist: vec!["127.0.0.1".to_string(), "::1".to_string()],
            rule_name_template: DEFAULT_RULE_NAME_TEMPLATE.to_string(),
            rule_tag: DEFAULT_RULE_TAG.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitoring: MonitoringConfig::default(),
            blocking: BlockingConfig::default(),
            services: default_services(),
        }
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![ServiceConfig {
        name: "RDP".to_string(),
        log_channel: "Security".to_string(),
        event_selector: 4625,
        enabled: true,
    }]
}

fn default_template() -> String {
    DEFAULT_RULE_NAME_TEMPLATE.to_string()
}

fn default_tag() -> String {
    DEFAULT_RULE_TAG.to_string()
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS_PER_QUERY
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate the configuration. Any error here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocking.failure_threshold < 1 {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.monitoring.lookback_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("lookback_duration"));
        }
        if self.monitoring.check_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("check_interval"));
        }
        if self.blocking.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("cleanup_interval"));
        }
        if self.monitoring.max_events_per_query == 0 {
            return Err(ConfigError::InvalidMaxEvents);
        }
        if self.blocking.rule_name_template.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate);
        }
        if self.blocking.rule_tag.trim().is_empty() {
            return Err(ConfigError::EmptyTag);
        }
        if !self.services.iter().any(|s| s.enabled) {
            return Err(ConfigError::NoServices);
        }

        // Surface bad whitelist entries at startup, not at first scan.
        Whitelist::from_entries(&self.blocking.whitelist)?;

        Ok(())
    }

    /// Enabled services.
    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.iter().filter(|s| s.enabled)
    }
}

impl BlockingConfig {
    /// Materialize a firewall rule name for a block.
    pub fn rule_name(&self, ip: IpAddr, service: &str, ts: DateTime<Utc>) -> String {
        generate_rule_name(&self.rule_name_template, ip, service, ts)
    }

    /// True when blocks are permanent.
    pub fn is_permanent(&self) -> bool {
        self.block_duration.is_zero()
    }
}

/// Substitute template placeholders to produce a rule name.
pub fn generate_rule_name(
    template: &str,
    ip: IpAddr,
    service: &str,
    ts: DateTime<Utc>,
) -> String {
    template
        .replace("{app}", APP_NAME)
        .replace("{timestamp}", &rule_timestamp(ts))
        .replace("{ip}", &ip.to_string())
        .replace("{service}", service)
}

/// Serde adapter for Go-style duration strings.
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
