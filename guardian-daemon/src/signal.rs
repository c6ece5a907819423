//! Shutdown signaling.
//!
//! The monitor's scanner and sweeper loops check a shared flag between
//! ticks. `ShutdownFlag::new` wires the flag to SIGINT; tests drive the
//! mocks instead.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Trait for checking whether shutdown was requested.
pub trait ShutdownCheck: Send + Sync {
    /// True once shutdown has been requested.
    fn should_stop(&self) -> bool;
}

/// Shared flag set by Ctrl+C.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::manual()
    }
}

impl ShutdownFlag {
    /// Create a flag and register a SIGINT handler for it.
    ///
    /// Handler registration can fail when one is already installed; the flag
    /// still works and can be triggered programmatically.
    pub fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = flag.clone();

        let _ = ctrlc::set_handler(move || {
            handler_flag.store(true, Ordering::SeqCst);
        });

        Self { flag }
    }

    /// Create a flag with no signal handler attached.
    pub fn manual() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl ShutdownCheck for ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Mock that never requests shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverShutdown;

impl NeverShutdown {
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownCheck for NeverShutdown {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Mock that requests shutdown immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysShutdown;

impl AlwaysShutdown {
    pub fn new() -> Self {
        Self
    }
}

impl ShutdownCheck for AlwaysShutdown {
    fn should_stop(&self) -> bool {
        true
    }
}

/// Mock that allows a fixed number of checks before requesting shutdown.
///
/// Bounds loop tests without involving the clock.
#[derive(Debug)]
pub struct StopAfter {
    remaining: AtomicUsize,
}

impl StopAfter {
    /// Allow `checks` negative answers, then stop.
    pub fn new(checks: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(checks),
        }
    }
}

impl ShutdownCheck for StopAfter {
    fn should_stop(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}
