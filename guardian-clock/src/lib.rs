//! Clock abstraction for Guardian.
//!
//! Provides a trait for reading the current UTC time, with both real and mock
//! implementations so every time-dependent path can be tested deterministically.
//! Also provides the UTC formatting helpers shared by the event-log query and
//! the firewall rule-name template.

pub mod format;

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Trait for reading the current time as UTC.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    instant: DateTime<Utc>,
}

impl MockClock {
    /// Create a mock clock pinned to the given instant.
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Create a mock clock pinned to a Unix timestamp in seconds.
    pub fn at_unix(secs: i64) -> Self {
        Self {
            instant: Utc.timestamp_opt(secs, 0).single().expect("valid unix timestamp"),
        }
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Mock clock that advances by a fixed step on each read.
///
/// Useful for loop tests where time must make progress without sleeping.
#[derive(Debug)]
pub struct AdvancingClock {
    micros: AtomicI64,
    step_micros: i64,
}

impl AdvancingClock {
    /// Create an advancing clock starting at `start` and stepping by
    /// `step_secs` seconds on every read.
    pub fn new(start: DateTime<Utc>, step_secs: i64) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
            step_micros: step_secs * 1_000_000,
        }
    }
}

impl Clock for AdvancingClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let micros = self.micros.fetch_add(self.step_micros, Ordering::SeqCst);
        Utc.timestamp_micros(micros).single().expect("valid unix timestamp")
    }
}
