//! Monitor command orchestration.
//!
//! Reconciles against rules left by a previous run, then spawns one scanner
//! thread per enabled service plus one process-wide sweeper thread. Scanners
//! share the firewall manager and are serialized by its lock; within one
//! service, scans are strictly sequential.

use std::time::Duration as StdDuration;

use chrono::Duration;
use guardian_clock::Clock;
use guardian_engine::{Config, ConfigError, FirewallManager, PolicyFilter, Whitelist};
use guardian_platform::EventSource;

use crate::logger::Logger;
use crate::scanner::{run_scanner, ScannerSummary};
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;
use crate::sweeper::{run_sweeper, SweeperSummary};

use super::{CommandError, CommandResult};

/// Result of a monitor run.
#[derive(Debug)]
pub struct MonitorReport {
    /// Blocks adopted from pre-existing rules at startup.
    pub adopted: usize,

    /// Per-service scanner totals, in configuration order.
    pub scanners: Vec<(String, ScannerSummary)>,

    /// Sweeper totals.
    pub sweeper: SweeperSummary,
}

impl MonitorReport {
    /// Total blocks installed across all scanners.
    pub fn total_installed(&self) -> u64 {
        self.scanners.iter().map(|(_, s)| s.installed).sum()
    }
}

/// Execute the monitor command until shutdown or for `duration`.
#[allow(clippy::too_many_arguments)]
pub fn execute_monitor(
    config: &Config,
    source: &dyn EventSource,
    manager: &FirewallManager,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
    shutdown: &dyn ShutdownCheck,
    logger: &dyn Logger,
    duration: Option<StdDuration>,
) -> CommandResult<MonitorReport> {
    config.validate()?;

    let whitelist = Whitelist::from_entries(&config.blocking.whitelist)
        .map_err(|e| CommandError::Config(ConfigError::from(e)))?;
    let policy = PolicyFilter::new(whitelist);

    let adopted = manager.reconcile(clock.now_utc())?;
    for block in &adopted {
        logger.info(&format!(
            "adopted existing rule '{}' for {}",
            block.rule_name, block.source_ip
        ));
    }

    let deadline = duration.map(|d| {
        clock.now_utc() + Duration::from_std(d).unwrap_or_else(|_| Duration::max_value())
    });

    let mut scanners = Vec::new();
    let mut sweeper = SweeperSummary::default();

    std::thread::scope(|scope| {
        let handles: Vec<_> = config
            .enabled_services()
            .map(|service| {
                let policy = &policy;
                let handle = scope.spawn(move || {
                    run_scanner(
                        config, service, source, policy, manager, clock, sleeper, shutdown,
                        logger, deadline,
                    )
                });
                (service.name.clone(), handle)
            })
            .collect();

        let sweep_handle = scope.spawn(|| {
            run_sweeper(
                manager,
                config.blocking.cleanup_interval,
                clock,
                sleeper,
                shutdown,
                logger,
                deadline,
            )
        });

        for (name, handle) in handles {
            let summary = handle.join().expect("scanner thread panicked");
            scanners.push((name, summary));
        }
        sweeper = sweep_handle.join().expect("sweeper thread panicked");
    });

    logger.info("monitoring stopped");

    Ok(MonitorReport {
        adopted: adopted.len(),
        scanners,
        sweeper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MockLogger;
    use crate::signal::ShutdownFlag;
    use crate::sleeper::MockSleeper;
    use chrono::{TimeZone, Utc};
    use guardian_clock::AdvancingClock;
    use guardian_engine::RuleSettings;
    use guardian_platform::{MockEventSource, MockFirewall};
    use std::sync::Arc;

    fn base() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn setup(config: &Config) -> (Arc<MockFirewall>, FirewallManager) {
        let backend = Arc::new(MockFirewall::new());
        let manager = FirewallManager::new(backend.clone(), RuleSettings::from(&config.blocking));
        (backend, manager)
    }

    #[test]
    fn test_monitor_runs_to_deadline() {
        let config = Config::default();
        let source = MockEventSource::new();
        let (_backend, manager) = setup(&config);
        let clock = AdvancingClock::new(base(), 10);
        let sleeper = MockSleeper::new();
        let shutdown = ShutdownFlag::manual();
        let logger = MockLogger::new();

        let report = execute_monitor(
            &config,
            &source,
            &manager,
            &clock,
            &sleeper,
            &shutdown,
            &logger,
            Some(StdDuration::from_secs(60)),
        )
        .expect("monitor");

        assert_eq!(report.scanners.len(), 1);
        assert_eq!(report.scanners[0].0, "RDP");
        // The clock is shared between the scanner and sweeper threads, so
        // per-thread cycle counts depend on scheduling; at least one of the
        // two must have completed a cycle before the deadline.
        assert!(report.scanners[0].1.cycles + report.sweeper.cycles >= 1);
        assert!(logger.contains("monitoring stopped"));
    }

    #[test]
    fn test_monitor_stops_on_shutdown() {
        let config = Config::default();
        let source = MockEventSource::new();
        let (_backend, manager) = setup(&config);
        let clock = AdvancingClock::new(base(), 1);
        let sleeper = MockSleeper::new();
        let shutdown = ShutdownFlag::manual();
        shutdown.trigger();
        let logger = MockLogger::new();

        let report = execute_monitor(
            &config, &source, &manager, &clock, &sleeper, &shutdown, &logger, None,
        )
        .expect("monitor");

        assert_eq!(report.scanners[0].1.cycles, 0);
        assert_eq!(report.sweeper.cycles, 0);
    }

    #[test]
    fn test_monitor_reconciles_at_startup() {
        let config = Config::default();
        let source = MockEventSource::new();
        let (backend, manager) = setup(&config);
        backend.seed_rule(
            "Guardian - 20240229 - 198.51.100.9",
            Some("198.51.100.9".parse().unwrap()),
            "GuardianTag=Guardian",
        );

        let clock = AdvancingClock::new(base(), 10);
        let sleeper = MockSleeper::new();
        let shutdown = ShutdownFlag::manual();
        shutdown.trigger();
        let logger = MockLogger::new();

        let report = execute_monitor(
            &config, &source, &manager, &clock, &sleeper, &shutdown, &logger, None,
        )
        .expect("monitor");

        assert_eq!(report.adopted, 1);
        assert!(manager.is_blocked("198.51.100.9".parse().unwrap(), base()));
        assert!(logger.contains("adopted existing rule"));
    }

    #[test]
    fn test_monitor_invalid_config_refused() {
        let mut config = Config::default();
        config.blocking.failure_threshold = 0;
        let source = MockEventSource::new();
        let (_backend, manager) = setup(&config);
        let clock = AdvancingClock::new(base(), 10);
        let sleeper = MockSleeper::new();
        let shutdown = ShutdownFlag::manual();
        let logger = MockLogger::new();

        let result = execute_monitor(
            &config, &source, &manager, &clock, &sleeper, &shutdown, &logger, None,
        );
        assert!(matches!(result, Err(CommandError::Config(_))));
    }

    #[test]
    fn test_monitor_end_to_end_block() {
        let mut config = Config::default();
        config.blocking.failure_threshold = 2;
        let source = MockEventSource::new();
        for i in 0..2 {
            source.add_record(
                "Security",
                format!(
                    "Event[0]:\n  Event ID: 4625\n  Time Created: {}\n  Account Name: admin\n  \
                     Source Network Address: 203.0.113.5\n",
                    (base() + Duration::seconds(i)).to_rfc3339()
                ),
            );
        }

        let (backend, manager) = setup(&config);
        // One-second clock steps and a generous deadline: the scanner is
        // certain to complete a scan while the events are inside the window.
        let clock = AdvancingClock::new(base() + Duration::seconds(10), 1);
        let sleeper = MockSleeper::new();
        let shutdown = ShutdownFlag::manual();
        let logger = MockLogger::new();

        let report = execute_monitor(
            &config,
            &source,
            &manager,
            &clock,
            &sleeper,
            &shutdown,
            &logger,
            Some(StdDuration::from_secs(300)),
        )
        .expect("monitor");

        assert_eq!(report.total_installed(), 1);
        assert_eq!(backend.rule_count(), 1);
    }
}
