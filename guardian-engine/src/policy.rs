//! Whitelist and block-decision policy.
//!
//! The policy filter sits between the window counter and the firewall
//! manager: it drops decisions for whitelisted addresses first (cheapest and
//! safest check), then drops duplicates for addresses that already carry an
//! active block.

use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use guardian_schema::BlockDecision;
use ipnetwork::IpNetwork;
use thiserror::Error;

use crate::blocker::FirewallManager;

/// Errors from whitelist construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WhitelistError {
    #[error("invalid whitelist entry '{0}': expected an IP address or CIDR")]
    InvalidEntry(String),
}

/// Immutable set of addresses that must never be blocked.
///
/// Holds exact addresses and CIDR networks, both IPv4 and IPv6.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    exact: HashSet<IpAddr>,
    networks: Vec<IpNetwork>,
}

impl Whitelist {
    /// Create an empty whitelist.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a whitelist from configuration entries.
    ///
    /// Entries containing `/` parse as CIDR networks, everything else as an
    /// exact address.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, WhitelistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::empty();

        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }

            if entry.contains('/') {
                let network: IpNetwork = entry
                    .parse()
                    .map_err(|_| WhitelistError::InvalidEntry(entry.to_string()))?;
                whitelist.networks.push(network);
            } else {
                let ip: IpAddr = entry
                    .parse()
                    .map_err(|_| WhitelistError::InvalidEntry(entry.to_string()))?;
                whitelist.exact.insert(ip);
            }
        }

        Ok(whitelist)
    }

    /// True when `ip` matches an exact entry or any network.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.exact.contains(&ip) || self.networks.iter().any(|n| n.contains(ip))
    }

    /// True when no entries are configured.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.networks.is_empty()
    }

    /// Number of exact entries.
    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    /// Number of network entries.
    pub fn network_count(&self) -> usize {
        self.networks.len()
    }
}

/// Outcome of policy evaluation for one block decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the decision to the firewall manager.
    Allow,
    /// Dropped: the address is whitelisted.
    Whitelisted,
    /// Dropped: the address already carries an active block.
    AlreadyBlocked,
}

/// Decides whether a block decision proceeds.
#[derive(Debug, Clone)]
pub struct PolicyFilter {
    whitelist: Whitelist,
}

impl PolicyFilter {
    /// Create a filter over the given whitelist.
    pub fn new(whitelist: Whitelist) -> Self {
        Self { whitelist }
    }

    /// Evaluate a decision: whitelist first, then active-block dedup.
    pub fn evaluate(
        &self,
        decision: &BlockDecision,
        manager: &FirewallManager,
        now: DateTime<Utc>,
    ) -> Verdict {
        if self.whitelist.contains(decision.source_ip) {
            return Verdict::Whitelisted;
        }
        if manager.is_blocked(decision.source_ip, now) {
            return Verdict::AlreadyBlocked;
        }
        Verdict::Allow
    }

    /// The whitelist this filter applies.
    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocker::RuleSettings;
    use chrono::TimeZone;
    use guardian_platform::MockFirewall;
    use std::sync::Arc;
    use std::time::Duration;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn decision(addr: &str) -> BlockDecision {
        BlockDecision {
            source_ip: ip(addr),
            count: 3,
            service: "RDP".to_string(),
            reason: "threshold exceeded: 3 attempts within 10m".to_string(),
        }
    }

    fn manager() -> (Arc<MockFirewall>, FirewallManager) {
        let backend = Arc::new(MockFirewall::new());
        let manager = FirewallManager::new(
            backend.clone(),
            RuleSettings {
                name_template: "Guardian - {timestamp} - {ip}".to_string(),
                tag: "Guardian".to_string(),
                block_duration: Duration::from_secs(120),
            },
        );
        (backend, manager)
    }

    // ===========================================
    // Whitelist membership
    // ===========================================

    #[test]
    fn test_whitelist_empty() {
        let whitelist = Whitelist::empty();
        assert!(whitelist.is_empty());
        assert!(!whitelist.contains(ip("203.0.113.5")));
    }

    #[test]
    fn test_whitelist_exact_match() {
        let whitelist = Whitelist::from_entries(["203.0.113.5"]).unwrap();
        assert!(whitelist.contains(ip("203.0.113.5")));
        assert!(!whitelist.contains(ip("203.0.113.6")));
    }

    #[test]
    fn test_whitelist_cidr_match() {
        let whitelist = Whitelist::from_entries(["10.0.0.0/8"]).unwrap();
        assert!(whitelist.contains(ip("10.0.0.7")));
        assert!(whitelist.contains(ip("10.255.255.255")));
        assert!(!whitelist.contains(ip("11.0.0.1")));
    }

    #[test]
    fn test_whitelist_ipv6_entries() {
        let whitelist = Whitelist::from_entries(["::1", "2001:db8::/32"]).unwrap();
        assert!(whitelist.contains(ip("::1")));
        assert!(whitelist.contains(ip("2001:db8::42")));
        assert!(!whitelist.contains(ip("2001:db9::1")));
    }

    #[test]
    fn test_whitelist_mixed_families_no_cross_match() {
        let whitelist = Whitelist::from_entries(["10.0.0.0/8"]).unwrap();
        assert!(!whitelist.contains(ip("::1")));
    }

    #[test]
    fn test_whitelist_skips_blank_entries() {
        let whitelist = Whitelist::from_entries(["", "  ", "127.0.0.1"]).unwrap();
        assert_eq!(whitelist.exact_count(), 1);
    }

    #[test]
    fn test_whitelist_invalid_ip_entry() {
        let err = Whitelist::from_entries(["not-an-ip"]).unwrap_err();
        assert_eq!(err, WhitelistError::InvalidEntry("not-an-ip".to_string()));
    }

    #[test]
    fn test_whitelist_invalid_cidr_entry() {
        assert!(Whitelist::from_entries(["10.0.0.0/99"]).is_err());
    }

    #[test]
    fn test_whitelist_counts() {
        let whitelist =
            Whitelist::from_entries(["127.0.0.1", "::1", "10.0.0.0/8", "192.168.0.0/16"]).unwrap();
        assert_eq!(whitelist.exact_count(), 2);
        assert_eq!(whitelist.network_count(), 2);
    }

    // ===========================================
    // Policy evaluation order
    // ===========================================

    #[test]
    fn test_evaluate_allows_unknown_ip() {
        let (_backend, manager) = manager();
        let filter = PolicyFilter::new(Whitelist::empty());
        assert_eq!(filter.evaluate(&decision("203.0.113.5"), &manager, now()), Verdict::Allow);
    }

    #[test]
    fn test_evaluate_drops_whitelisted() {
        let (_backend, manager) = manager();
        let filter = PolicyFilter::new(Whitelist::from_entries(["10.0.0.0/8"]).unwrap());
        assert_eq!(
            filter.evaluate(&decision("10.0.0.7"), &manager, now()),
            Verdict::Whitelisted
        );
    }

    #[test]
    fn test_evaluate_drops_actively_blocked() {
        let (_backend, manager) = manager();
        manager
            .install(ip("203.0.113.5"), "RDP", "test", 3, now())
            .unwrap();

        let filter = PolicyFilter::new(Whitelist::empty());
        assert_eq!(
            filter.evaluate(&decision("203.0.113.5"), &manager, now()),
            Verdict::AlreadyBlocked
        );
    }

    #[test]
    fn test_evaluate_allows_after_block_expiry() {
        let (_backend, manager) = manager();
        manager
            .install(ip("203.0.113.5"), "RDP", "test", 3, now())
            .unwrap();

        let filter = PolicyFilter::new(Whitelist::empty());
        let later = now() + chrono::Duration::seconds(300);
        assert_eq!(filter.evaluate(&decision("203.0.113.5"), &manager, later), Verdict::Allow);
    }

    #[test]
    fn test_whitelist_wins_over_block_dedup() {
        // A whitelisted address is reported as whitelisted even when a stale
        // block exists for it.
        let (_backend, manager) = manager();
        manager
            .install(ip("10.0.0.7"), "RDP", "test", 3, now())
            .unwrap();

        let filter = PolicyFilter::new(Whitelist::from_entries(["10.0.0.0/8"]).unwrap());
        assert_eq!(
            filter.evaluate(&decision("10.0.0.7"), &manager, now()),
            Verdict::Whitelisted
        );
    }
}
