//! Event-log query capability.
//!
//! The host log subsystem is polled, not push-based: each scan asks for
//! records created since the start of the sliding window. The Windows
//! implementation shells out to `wevtutil`; the query bound is always UTC
//! with a `Z` suffix (a local-time bound silently matches nothing).

use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use guardian_clock::format::query_bound;
use guardian_schema::RawRecord;
use thiserror::Error;

/// Errors from event-log queries.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("failed to run event-log query tool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("event-log query failed with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("event-log output was not valid UTF-8")]
    OutputEncoding(#[from] std::string::FromUtf8Error),
}

/// Capability to query the host's log subsystem for raw event records.
pub trait EventSource: Send + Sync {
    /// Return at most `max` records from `channel` matching `event_id`,
    /// created at or after `since`.
    ///
    /// Records are not required to be unique; deduplication happens in the
    /// window counter. The call must not block indefinitely.
    fn query(
        &self,
        channel: &str,
        event_id: u32,
        since: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<RawRecord>, EventSourceError>;
}

/// Build the XPath filter for an event-log query.
///
/// The `TimeCreated` bound is UTC ISO-8601 with a trailing `Z`.
pub fn build_query(event_id: u32, since: DateTime<Utc>) -> String {
    format!(
        "*[System[EventID={} and TimeCreated[@SystemTime>='{}']]]",
        event_id,
        query_bound(since)
    )
}

/// Split `wevtutil /f:text` output into individual event blocks.
///
/// Each block starts with an `Event[N]:` header line.
pub fn split_event_blocks(output: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in output.lines() {
        if line.starts_with("Event[") {
            if !current.trim().is_empty() {
                blocks.push(current.clone());
            }
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Event source backed by the Windows Event Log via `wevtutil`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsEventLog;

impl WindowsEventLog {
    /// Create a new Windows event-log source.
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for WindowsEventLog {
    fn query(
        &self,
        channel: &str,
        event_id: u32,
        since: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<RawRecord>, EventSourceError> {
        let output = Command::new("wevtutil")
            .arg("qe")
            .arg(channel)
            .arg(format!("/q:{}", build_query(event_id, since)))
            .arg("/f:text")
            .arg(format!("/c:{}", max))
            .output()?;

        if !output.status.success() {
            return Err(EventSourceError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8(output.stdout)?;
        Ok(split_event_blocks(&text)
            .into_iter()
            .map(|body| RawRecord::new(channel, body))
            .collect())
    }
}

/// Mock event source for tests.
///
/// Returns the seeded records for the queried channel, capped at `max`.
/// The `since` bound is intentionally ignored: window filtering is the
/// counter's responsibility and tests exercise it through event timestamps.
#[derive(Debug, Default)]
pub struct MockEventSource {
    records: Mutex<Vec<RawRecord>>,
    error: Mutex<Option<String>>,
    queries: AtomicUsize,
}

impl MockEventSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one record.
    pub fn add_record(&self, channel: impl Into<String>, body: impl Into<String>) {
        self.records
            .lock()
            .unwrap()
            .push(RawRecord::new(channel, body));
    }

    /// Make every subsequent query fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.error.lock().unwrap() = Some(message.into());
    }

    /// Clear a previously scripted failure.
    pub fn clear_failure(&self) {
        *self.error.lock().unwrap() = None;
    }

    /// Remove all seeded records.
    pub fn clear_records(&self) {
        self.records.lock().unwrap().clear();
    }

    /// Number of queries observed.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl EventSource for MockEventSource {
    fn query(
        &self,
        channel: &str,
        _event_id: u32,
        _since: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<RawRecord>, EventSourceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.error.lock().unwrap().clone() {
            return Err(EventSourceError::Failed {
                status: 1,
                stderr: message,
            });
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.channel == channel)
            .take(max)
            .cloned()
            .collect())
    }
}
