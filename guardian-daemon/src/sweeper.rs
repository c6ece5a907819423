//! Sweeper: periodic removal of expired blocks.
//!
//! One sweeper runs per process. Each tick asks the firewall manager to
//! delete the rules of every expired block; deletion failures are logged and
//! retried on the next tick.

use chrono::{DateTime, Utc};
use guardian_clock::Clock;
use guardian_engine::FirewallManager;

use crate::logger::Logger;
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

/// Accumulated totals for the sweeper's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweeperSummary {
    pub cycles: u64,
    pub removed: u64,
    pub failed: u64,
}

/// Run the sweep loop until shutdown or `deadline`.
pub fn run_sweeper(
    manager: &FirewallManager,
    cleanup_interval: std::time::Duration,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
    shutdown: &dyn ShutdownCheck,
    logger: &dyn Logger,
    deadline: Option<DateTime<Utc>>,
) -> SweeperSummary {
    let mut summary = SweeperSummary::default();

    loop {
        if shutdown.should_stop() {
            break;
        }
        if let Some(deadline) = deadline {
            if clock.now_utc() >= deadline {
                break;
            }
        }

        let now = clock.now_utc();
        let report = manager.sweep(now);
        summary.cycles += 1;
        summary.removed += report.removed.len() as u64;
        summary.failed += report.failed.len() as u64;

        for block in &report.removed {
            let active_secs = (now - block.created_at).num_seconds();
            logger.info(&format!(
                "removed expired block for {} (rule '{}', active {}s)",
                block.source_ip, block.rule_name, active_secs
            ));
        }
        for (ip, error) in &report.failed {
            logger.error(&format!(
                "failed to remove expired block for {}, will retry: {}",
                ip, error
            ));
        }

        if shutdown.should_stop() {
            break;
        }
        sleeper.sleep(cleanup_interval);
    }

    summary
}
