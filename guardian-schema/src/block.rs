//! Block decisions and active-block records.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A proposal to block a source address, emitted by the window counter when
/// the failure threshold is crossed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDecision {
    /// Address to block.
    pub source_ip: IpAddr,

    /// Failures counted inside the window when the threshold was crossed.
    pub count: usize,

    /// Service the failures targeted.
    pub service: String,

    /// Human-readable justification, e.g.
    /// `threshold exceeded: 3 attempts within 10m`.
    pub reason: String,
}

/// The authoritative record of a block currently in force.
///
/// The firewall manager owns the canonical set of these; everything else
/// reads copies through its interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBlock {
    /// Blocked address. Unique among active blocks.
    pub source_ip: IpAddr,

    /// Name of the underlying firewall rule. Deletion always goes by this
    /// stored name, never by re-deriving it from the template.
    pub rule_name: String,

    /// When the block was installed or adopted.
    pub created_at: DateTime<Utc>,

    /// When the block lapses. `None` means permanent.
    pub expires_at: Option<DateTime<Utc>>,

    /// Why the block was installed.
    pub reason: String,

    /// Service whose failures triggered the block.
    pub service: String,

    /// Failures counted when the block was installed.
    pub attack_count: usize,
}

impl ActiveBlock {
    /// True when the block has lapsed at `now`. Permanent blocks never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Time left until expiry, clamped to zero. `None` for permanent blocks.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| (expires_at - now).max(Duration::zero()))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("block serialization cannot fail")
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
