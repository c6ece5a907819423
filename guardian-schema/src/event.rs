//! Raw event records and decoded failure events.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Username sentinel for empty, `-`, and machine-account names.
pub const SYSTEM_USERNAME: &str = "system";

/// One undecoded record as returned by the event source.
///
/// `body` is the text of a single event block; the parser decides whether it
/// describes an authentication failure worth counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Name of the log channel the record came from (e.g. `Security`).
    pub channel: String,

    /// Full text of the event block.
    pub body: String,
}

impl RawRecord {
    /// Create a raw record.
    pub fn new(channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            body: body.into(),
        }
    }
}

/// Threat severity derived from the targeted account name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Lowercase display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

/// One decoded authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    /// When the failure happened, UTC.
    pub timestamp: DateTime<Utc>,

    /// Address the attempt came from.
    pub source_ip: IpAddr,

    /// Monitored service the attempt targeted (e.g. `RDP`).
    pub service: String,

    /// Targeted account name, normalized (see [`normalize_username`]).
    pub username: String,

    /// Severity derived from the targeted account.
    pub severity: Severity,

    /// Log channel the record came from.
    pub source_ref: String,
}

impl FailureEvent {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("event serialization cannot fail")
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deduplication key for window counting: the same source observed with
    /// the same microsecond timestamp and account is one failure, even when
    /// two overlapping queries both return it.
    pub fn dedup_key(&self) -> (IpAddr, i64, &str) {
        (self.source_ip, self.timestamp.timestamp_micros(), &self.username)
    }
}

/// Normalize a targeted account name.
///
/// Empty names, `-`, and machine accounts (trailing `$`) all collapse to the
/// [`SYSTEM_USERNAME`] sentinel.
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.ends_with('$') {
        SYSTEM_USERNAME.to_string()
    } else {
        trimmed.to_string()
    }
}
