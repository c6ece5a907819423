//! Guardian daemon library.
//!
//! This crate hosts the long-running side of Guardian: the clap CLI, the
//! scanner loop that drives the event-to-block pipeline for each monitored
//! service, the expiration sweeper, and the command orchestration shared by
//! the binary and the integration tests.

pub mod cli;
pub mod commands;
pub mod exit;
pub mod logger;
pub mod scanner;
pub mod signal;
pub mod sleeper;
pub mod sweeper;

pub use cli::{parse_from, CheckArgs, Cli, CliError, Command, MonitorArgs, StatusArgs};
pub use commands::{
    execute_check, execute_monitor, execute_status, load_config, CheckReport, CommandError,
    CommandResult, MonitorReport, StatusReport,
};
pub use logger::{Level, LogEntry, Logger, MockLogger, NullLogger, StderrLogger};
pub use scanner::{run_scanner, scan_once, ScanOutcome, ScannerSummary};
pub use signal::{AlwaysShutdown, NeverShutdown, ShutdownCheck, ShutdownFlag, StopAfter};
pub use sleeper::{MockSleeper, RealSleeper, Sleeper};
pub use sweeper::{run_sweeper, SweeperSummary};
