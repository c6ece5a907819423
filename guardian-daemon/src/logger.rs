//! Logging abstraction for testable output.
//!
//! A trait-based logger keeps the pipeline free of global state: the daemon
//! builds one logger at startup and passes it down. The mock implementation
//! captures entries so tests can assert on what was logged, which matters
//! here: several error policies are "log and continue", and the log line is
//! the only observable effect.

use std::io::Write;
use std::sync::{Arc, RwLock};

/// Log level. Lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    /// Lowercase display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }
}

/// Trait for logging output.
///
/// Implementations must be thread-safe: scanners and the sweeper log
/// concurrently.
pub trait Logger: Send + Sync {
    /// Log a message at the given level.
    fn log(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Logger that writes to stderr, filtered by level.
#[derive(Debug)]
pub struct StderrLogger {
    level: Level,
}

impl StderrLogger {
    /// Create a stderr logger showing entries at or above `level`.
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Create a logger from a `-v` flag count: zero shows info and up,
    /// anything more shows debug too.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::new(Level::Info),
            _ => Self::new(Level::Debug),
        }
    }
}

impl Logger for StderrLogger {
    fn log(&self, level: Level, message: &str) {
        if level <= self.level {
            let _ = writeln!(std::io::stderr(), "[{}] {}", level.as_str(), message);
        }
    }
}

/// A captured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Mock logger for tests; captures every entry regardless of level.
#[derive(Debug, Clone, Default)]
pub struct MockLogger {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MockLogger {
    /// Create an empty mock logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().unwrap().clone()
    }

    /// All captured message texts.
    pub fn messages(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.message.clone()).collect()
    }

    /// Message texts captured at one level.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }

    /// True when any message contains the substring.
    pub fn contains(&self, substring: &str) -> bool {
        self.messages().iter().any(|m| m.contains(substring))
    }

    /// Number of captured entries.
    pub fn count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Drop all captured entries.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl Logger for MockLogger {
    fn log(&self, level: Level, message: &str) {
        self.entries.write().unwrap().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl NullLogger {
    /// Create a null logger.
    pub fn new() -> Self {
        Self
    }
}

impl Logger for NullLogger {
    fn log(&self, _level: Level, _message: &str) {}
}
