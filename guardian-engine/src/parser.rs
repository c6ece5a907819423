//! Event record parser.
//!
//! Decodes raw event blocks into [`FailureEvent`]s or drops them. Parsing is
//! never fatal: anything that does not look like a counted failure from a
//! remote address yields `None`.

use chrono::{DateTime, Utc};
use guardian_clock::format::parse_event_time;
use guardian_schema::{normalize_username, FailureEvent, RawRecord, Severity};
use regex::Regex;

use crate::config::ServiceConfig;

/// Parser for textual event-log records.
///
/// Field extraction mirrors the layout of `wevtutil /f:text` output:
/// one `Key: value` field per line.
#[derive(Debug)]
pub struct EventParser {
    event_id: Regex,
    source_ip: Regex,
    account: Regex,
    time_created: Regex,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    /// Create a parser with compiled field patterns.
    pub fn new() -> Self {
        Self {
            event_id: Regex::new(r"Event ID:\s*(\d+)").expect("static pattern"),
            source_ip: Regex::new(r"Source Network Address:\s*(\S+)").expect("static pattern"),
            account: Regex::new(r"Account Name:\s*(\S+)").expect("static pattern"),
            time_created: Regex::new(r"Time Created:\s*([^\r\n]+)").expect("static pattern"),
        }
    }

    /// Decode one raw record for `service`, or drop it.
    ///
    /// Drops when the event ID does not match the service selector, the
    /// source address is absent, unparseable, or local, or the record is not
    /// recognized at all. `fallback_now` is used when the record carries no
    /// parseable creation time.
    pub fn parse(
        &self,
        raw: &RawRecord,
        service: &ServiceConfig,
        fallback_now: DateTime<Utc>,
    ) -> Option<FailureEvent> {
        let event_id: u32 = self
            .event_id
            .captures(&raw.body)?
            .get(1)?
            .as_str()
            .parse()
            .ok()?;
        if event_id != service.event_selector {
            return None;
        }

        let ip_literal = self.source_ip.captures(&raw.body)?.get(1)?.as_str();
        if ip_literal == "-" {
            return None;
        }
        let source_ip: std::net::IpAddr = ip_literal.parse().ok()?;
        if source_ip.is_loopback() {
            return None;
        }

        let username = normalize_username(
            self.account
                .captures(&raw.body)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .unwrap_or(""),
        );

        let timestamp = self
            .time_created
            .captures(&raw.body)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_event_time(m.as_str()))
            .unwrap_or(fallback_now);

        let severity = severity_for(&username);

        Some(FailureEvent {
            timestamp,
            source_ip,
            service: service.name.clone(),
            username,
            severity,
            source_ref: raw.channel.clone(),
        })
    }
}

/// Severity heuristic over the targeted account name.
///
/// Privileged accounts rate high, service accounts and common dictionary
/// targets rate medium, everything else low.
pub fn severity_for(username: &str) -> Severity {
    const PRIVILEGED: [&str; 4] = ["root", "admin", "administrator", "sa"];
    const DICTIONARY: [&str; 4] = ["user", "test", "guest", "demo"];

    if PRIVILEGED.iter().any(|p| username.eq_ignore_ascii_case(p)) {
        return Severity::High;
    }

    let lower = username.to_ascii_lowercase();
    if lower.ends_with("service") || lower.ends_with("svc") {
        return Severity::Medium;
    }
    if DICTIONARY.iter().any(|d| username.eq_ignore_ascii_case(d)) {
        return Severity::Medium;
    }

    Severity::Low
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use guardian_schema::SYSTEM_USERNAME;

    fn rdp_service() -> ServiceConfig {
        ServiceConfig {
            name: "RDP".to_string(),
            log_channel: "Security".to_string(),
            event_selector: 4625,
            enabled: true,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(body: &str) -> RawRecord {
        RawRecord::new("Security", body)
    }

    const FULL_EVENT: &str = "\
Event[0]:
  Log Name: Security
  Event ID: 4625
  Time Created: 2024-03-01T11:59:30.123456700Z
  Description:
    An account failed to log on.
    Account Name:  intruder
    Logon Type:  10
    Source Network Address:  203.0.113.5
";

    // ===========================================
    // Happy path
    // ===========================================

    #[test]
    fn test_parse_full_event() {
        let parser = EventParser::new();
        let event = parser.parse(&record(FULL_EVENT), &rdp_service(), now()).unwrap();

        assert_eq!(event.source_ip, "203.0.113.5".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(event.username, "intruder");
        assert_eq!(event.service, "RDP");
        assert_eq!(event.source_ref, "Security");
        assert_eq!(event.severity, Severity::Low);
        // Record's own Time Created wins over the fallback clock.
        assert_eq!(event.timestamp.timestamp(), 1_709_294_370);
    }

    #[test]
    fn test_parse_ipv6_source() {
        let body = "Event ID: 4625\nAccount Name: admin\nSource Network Address: 2001:db8::7\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.source_ip, "2001:db8::7".parse::<std::net::IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_missing_time_uses_fallback() {
        let body = "Event ID: 4625\nAccount Name: bob\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.timestamp, now());
    }

    #[test]
    fn test_parse_unparseable_time_uses_fallback() {
        let body = "Event ID: 4625\nTime Created: last tuesday\nAccount Name: bob\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.timestamp, now());
    }

    // ===========================================
    // Drop rules
    // ===========================================

    #[test]
    fn test_parse_drops_wrong_event_id() {
        let body = "Event ID: 4624\nAccount Name: bob\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_missing_event_id() {
        let body = "Account Name: bob\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_missing_source_address() {
        let body = "Event ID: 4625\nAccount Name: bob\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_dash_source_address() {
        let body = "Event ID: 4625\nAccount Name: bob\nSource Network Address: -\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_loopback_v4() {
        let body = "Event ID: 4625\nAccount Name: bob\nSource Network Address: 127.0.0.1\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_loopback_v6() {
        let body = "Event ID: 4625\nAccount Name: bob\nSource Network Address: ::1\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_unparseable_address() {
        let body = "Event ID: 4625\nAccount Name: bob\nSource Network Address: not.an.ip.addr\n";
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_drops_garbage() {
        let parser = EventParser::new();
        assert!(parser.parse(&record("garbage"), &rdp_service(), now()).is_none());
    }

    #[test]
    fn test_parse_respects_service_selector() {
        // A service configured for a different selector accepts that ID.
        let body = "Event ID: 4771\nAccount Name: bob\nSource Network Address: 203.0.113.5\n";
        let mut service = rdp_service();
        service.event_selector = 4771;
        let parser = EventParser::new();
        assert!(parser.parse(&record(body), &service, now()).is_some());
    }

    // ===========================================
    // Username normalization
    // ===========================================

    #[test]
    fn test_parse_missing_account_is_system() {
        let body = "Event ID: 4625\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.username, SYSTEM_USERNAME);
    }

    #[test]
    fn test_parse_dash_account_is_system() {
        let body = "Event ID: 4625\nAccount Name: -\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.username, SYSTEM_USERNAME);
    }

    #[test]
    fn test_parse_machine_account_is_system() {
        let body = "Event ID: 4625\nAccount Name: HOST07$\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.username, SYSTEM_USERNAME);
    }

    // ===========================================
    // Severity heuristics
    // ===========================================

    #[test]
    fn test_severity_privileged_accounts() {
        assert_eq!(severity_for("administrator"), Severity::High);
        assert_eq!(severity_for("Admin"), Severity::High);
        assert_eq!(severity_for("ROOT"), Severity::High);
        assert_eq!(severity_for("sa"), Severity::High);
    }

    #[test]
    fn test_severity_service_accounts() {
        assert_eq!(severity_for("backupservice"), Severity::Medium);
        assert_eq!(severity_for("sqlsvc"), Severity::Medium);
    }

    #[test]
    fn test_severity_dictionary_targets() {
        assert_eq!(severity_for("guest"), Severity::Medium);
        assert_eq!(severity_for("Test"), Severity::Medium);
        assert_eq!(severity_for("demo"), Severity::Medium);
        assert_eq!(severity_for("user"), Severity::Medium);
    }

    #[test]
    fn test_severity_default_low() {
        assert_eq!(severity_for("alice"), Severity::Low);
        assert_eq!(severity_for(SYSTEM_USERNAME), Severity::Low);
    }

    #[test]
    fn test_parsed_severity_reflects_account() {
        let body = "Event ID: 4625\nAccount Name: administrator\nSource Network Address: 203.0.113.5\n";
        let parser = EventParser::new();
        let event = parser.parse(&record(body), &rdp_service(), now()).unwrap();
        assert_eq!(event.severity, Severity::High);
    }
}
