//! OS-facing capabilities for Guardian.
//!
//! This crate provides:
//! - `EventSource` trait for querying the host log subsystem
//! - `FirewallBackend` trait for creating, deleting, and enumerating rules
//! - Windows implementations shelling out to `wevtutil` and `netsh`
//! - Mock implementations for deterministic tests

pub mod event_log;
pub mod firewall;

pub use event_log::{
    build_query, split_event_blocks, EventSource, EventSourceError, MockEventSource,
    WindowsEventLog,
};
pub use firewall::{
    parse_rule_listing, FirewallBackend, FirewallBackendError, MockFirewall, RuleRecord,
    WindowsFirewall,
};
