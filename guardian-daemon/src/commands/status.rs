//! Status command: report active blocks.
//!
//! Status reads through the firewall manager after reconciling, so it sees
//! blocks created by a still-running daemon as well as rules surviving a
//! crash.

use guardian_clock::Clock;
use guardian_engine::FirewallManager;
use guardian_schema::ActiveBlock;

use super::CommandResult;

/// Snapshot of currently active blocks.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub active_blocks: Vec<ActiveBlock>,
}

impl StatusReport {
    /// Number of active blocks.
    pub fn count(&self) -> usize {
        self.active_blocks.len()
    }
}

/// Execute the status command.
pub fn execute_status(
    manager: &FirewallManager,
    clock: &dyn Clock,
) -> CommandResult<StatusReport> {
    let now = clock.now_utc();
    manager.reconcile(now)?;

    Ok(StatusReport {
        active_blocks: manager.list(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use guardian_clock::MockClock;
    use guardian_engine::RuleSettings;
    use guardian_platform::MockFirewall;
    use std::sync::Arc;
    use std::time::Duration;

    fn manager(backend: Arc<MockFirewall>) -> FirewallManager {
        FirewallManager::new(
            backend,
            RuleSettings {
                name_template: "Guardian - {timestamp} - {ip}".to_string(),
                tag: "Guardian".to_string(),
                block_duration: Duration::from_secs(120),
            },
        )
    }

    #[test]
    fn test_status_empty() {
        let backend = Arc::new(MockFirewall::new());
        let manager = manager(backend);
        let clock = MockClock::at_unix(1_709_294_400);

        let report = execute_status(&manager, &clock).expect("status");
        assert_eq!(report.count(), 0);
    }

    #[test]
    fn test_status_reports_installed_blocks() {
        let backend = Arc::new(MockFirewall::new());
        let manager = manager(backend);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        manager
            .install("203.0.113.5".parse().unwrap(), "RDP", "r", 3, now)
            .unwrap();

        let clock = MockClock::new(now);
        let report = execute_status(&manager, &clock).expect("status");

        assert_eq!(report.count(), 1);
        assert_eq!(
            report.active_blocks[0].source_ip,
            "203.0.113.5".parse::<std::net::IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_status_sees_rules_from_previous_run() {
        let backend = Arc::new(MockFirewall::new());
        backend.seed_rule(
            "Guardian - old - 198.51.100.9",
            Some("198.51.100.9".parse().unwrap()),
            "GuardianTag=Guardian",
        );
        let manager = manager(backend);
        let clock = MockClock::at_unix(1_709_294_400);

        let report = execute_status(&manager, &clock).expect("status");
        assert_eq!(report.count(), 1);
        assert_eq!(report.active_blocks[0].rule_name, "Guardian - old - 198.51.100.9");
    }

    #[test]
    fn test_status_backend_failure() {
        let backend = Arc::new(MockFirewall::new());
        backend.set_fail_list(true);
        let manager = manager(backend);
        let clock = MockClock::at_unix(1_709_294_400);

        assert!(execute_status(&manager, &clock).is_err());
    }
}
