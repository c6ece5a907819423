//! UTC formatting and parsing helpers.
//!
//! The event-log query bound MUST be UTC with a trailing `Z`. Feeding local
//! time into the event-log XPath filter silently matches zero records, so the
//! bound is produced here by one pure function and nowhere else.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp as the lower bound for an event-log query.
///
/// Produces ISO-8601 UTC with millisecond precision and the `Z` suffix,
/// e.g. `2024-03-01T12:00:00.000Z`.
pub fn query_bound(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a timestamp for use in a firewall rule name.
///
/// Produces `YYYYMMDDHHMMSS` in UTC, e.g. `20240301120000`.
pub fn rule_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d%H%M%S").to_string()
}

/// Parse a `Time Created` value from an event record.
///
/// Accepts RFC 3339 with any sub-second precision (the event log emits
/// nanoseconds). Returns `None` when the value does not parse; callers fall
/// back to their current clock.
pub fn parse_event_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
