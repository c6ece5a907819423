//! Sleep abstraction for the scan and sweep loops.

use std::sync::Mutex;
use std::time::Duration;

/// Trait for waiting between ticks.
pub trait Sleeper: Send + Sync {
    /// Sleep for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSleeper;

impl RealSleeper {
    pub fn new() -> Self {
        Self
    }
}

impl Sleeper for RealSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Mock sleeper: returns immediately and records requested durations.
#[derive(Debug, Default)]
pub struct MockSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl MockSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far.
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }

    /// Number of sleep calls observed.
    pub fn count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }
}

impl Sleeper for MockSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
