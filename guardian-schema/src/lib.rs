//! Shared data model for Guardian.
//!
//! This crate defines the value types that flow through the pipeline:
//! raw event records, decoded failure events, block decisions, and the
//! active-block records owned by the firewall manager.

pub mod block;
pub mod event;

pub use block::{ActiveBlock, BlockDecision};
pub use event::{normalize_username, FailureEvent, RawRecord, Severity, SYSTEM_USERNAME};
