//! Per-IP sliding-window failure counting.
//!
//! The counter holds, for every source address, the timestamps of failures
//! observed inside the trailing lookback window. Every ingest trims stale
//! timestamps before the count is taken, so memory stays proportional to the
//! number of failures inside the window.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use guardian_schema::FailureEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Observation {
    timestamp: DateTime<Utc>,
    username: String,
}

impl Observation {
    fn matches(&self, event: &FailureEvent) -> bool {
        self.timestamp.timestamp_micros() == event.timestamp.timestamp_micros()
            && self.username == event.username
    }
}

/// Sliding-window counter keyed on source IP.
///
/// Overlapping queries can hand the counter the same failure twice; the
/// `(source_ip, timestamp in microseconds, username)` key makes the second
/// observation a no-op.
#[derive(Debug)]
pub struct WindowCounter {
    window: Duration,
    entries: HashMap<IpAddr, Vec<Observation>>,
}

impl WindowCounter {
    /// Create a counter over the given lookback window.
    pub fn new(lookback: StdDuration) -> Self {
        Self {
            window: Duration::from_std(lookback).unwrap_or_else(|_| Duration::max_value()),
            entries: HashMap::new(),
        }
    }

    /// Record one failure and return the in-window count for its source.
    ///
    /// Events older than the window and duplicate observations leave the
    /// count unchanged.
    pub fn ingest(&mut self, event: &FailureEvent, now: DateTime<Utc>) -> usize {
        let window = self.window;
        let observations = self.entries.entry(event.source_ip).or_default();
        Self::trim(observations, now, window);

        let in_window = now - event.timestamp <= window;
        let duplicate = observations.iter().any(|o| o.matches(event));

        if in_window && !duplicate {
            // Keep timestamps ordered even if the source hands us events
            // slightly out of order at a query boundary.
            let position = observations
                .partition_point(|o| o.timestamp <= event.timestamp);
            observations.insert(
                position,
                Observation {
                    timestamp: event.timestamp,
                    username: event.username.clone(),
                },
            );
        }

        let count = observations.len();
        if count == 0 {
            self.entries.remove(&event.source_ip);
        }
        count
    }

    /// In-window failure count for one source, without mutating state.
    pub fn count(&self, ip: IpAddr, now: DateTime<Utc>) -> usize {
        self.entries
            .get(&ip)
            .map(|observations| {
                observations
                    .iter()
                    .filter(|o| now - o.timestamp <= self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Trim every sequence to the window and drop sources with nothing left.
    /// Runs once per scan, after ingest.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        for observations in self.entries.values_mut() {
            Self::trim(observations, now, window);
        }
        self.entries.retain(|_, observations| !observations.is_empty());
    }

    /// Sources currently tracked, in address order.
    pub fn tracked_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.entries.keys().copied().collect();
        ips.sort();
        ips
    }

    /// Number of sources currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    fn trim(observations: &mut Vec<Observation>, now: DateTime<Utc>, window: Duration) {
        observations.retain(|o| now - o.timestamp <= window);
    }
}
