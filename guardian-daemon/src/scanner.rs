//! Scanner: drives the event-to-block pipeline for one service.
//!
//! Each tick queries the event source for records created since the start of
//! the sliding window, decodes them, feeds the window counter, and pushes any
//! threshold crossings through the policy filter into the firewall manager.
//! Query failures skip the scan; the next tick retries.

use std::collections::HashSet;
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use guardian_clock::Clock;
use guardian_engine::{
    Config, EventParser, FirewallError, FirewallManager, PolicyFilter, ServiceConfig, Verdict,
    WindowCounter,
};
use guardian_platform::EventSource;
use guardian_schema::BlockDecision;

use crate::logger::Logger;
use crate::signal::ShutdownCheck;
use crate::sleeper::Sleeper;

/// Result of one scan tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Raw records returned by the event source.
    pub queried: usize,

    /// Records decoded into failure events.
    pub parsed: usize,

    /// Block decisions emitted by the counter.
    pub decisions: usize,

    /// Blocks actually installed.
    pub installed: usize,
}

/// Accumulated totals for one scanner's lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScannerSummary {
    pub cycles: u64,
    pub queried: u64,
    pub parsed: u64,
    pub decisions: u64,
    pub installed: u64,
}

impl ScannerSummary {
    fn accumulate(&mut self, outcome: ScanOutcome) {
        self.cycles += 1;
        self.queried += outcome.queried as u64;
        self.parsed += outcome.parsed as u64;
        self.decisions += outcome.decisions as u64;
        self.installed += outcome.installed as u64;
    }
}

/// Run one scan tick for `service`: query, decode, count, decide, install.
#[allow(clippy::too_many_arguments)]
pub fn scan_once(
    config: &Config,
    service: &ServiceConfig,
    source: &dyn EventSource,
    parser: &EventParser,
    counter: &mut WindowCounter,
    policy: &PolicyFilter,
    manager: &FirewallManager,
    clock: &dyn Clock,
    logger: &dyn Logger,
) -> ScanOutcome {
    let now = clock.now_utc();
    let lookback = Duration::from_std(config.monitoring.lookback_duration)
        .unwrap_or_else(|_| Duration::max_value());
    let since = now - lookback;

    let records = match source.query(
        &service.log_channel,
        service.event_selector,
        since,
        config.monitoring.max_events_per_query,
    ) {
        Ok(records) => records,
        Err(e) => {
            logger.warn(&format!(
                "event query for {} failed, skipping scan: {}",
                service.name, e
            ));
            return ScanOutcome::default();
        }
    };

    let mut outcome = ScanOutcome {
        queried: records.len(),
        ..ScanOutcome::default()
    };

    let mut events: Vec<_> = records
        .iter()
        .filter_map(|record| {
            let event = parser.parse(record, service, now);
            if event.is_none() {
                logger.debug(&format!("dropped unparseable record on {}", record.channel));
            }
            event
        })
        .collect();
    events.sort_by_key(|e| e.timestamp);
    outcome.parsed = events.len();

    let window_text = humantime::format_duration(config.monitoring.lookback_duration).to_string();
    let mut proposed: HashSet<IpAddr> = HashSet::new();

    for event in &events {
        let count = counter.ingest(event, now);

        if count >= config.blocking.failure_threshold && proposed.insert(event.source_ip) {
            let decision = BlockDecision {
                source_ip: event.source_ip,
                count,
                service: service.name.clone(),
                reason: format!(
                    "threshold exceeded: {} attempts within {}",
                    count, window_text
                ),
            };
            outcome.decisions += 1;

            match policy.evaluate(&decision, manager, now) {
                Verdict::Whitelisted => {
                    logger.info(&format!("{} is whitelisted, not blocking", decision.source_ip));
                }
                Verdict::AlreadyBlocked => {
                    logger.debug(&format!("{} is already blocked", decision.source_ip));
                }
                Verdict::Allow => match manager.install(
                    decision.source_ip,
                    &decision.service,
                    &decision.reason,
                    decision.count,
                    now,
                ) {
                    Ok(block) => {
                        outcome.installed += 1;
                        logger.info(&format!(
                            "blocked {} with rule '{}' ({})",
                            block.source_ip, block.rule_name, block.reason
                        ));
                    }
                    Err(FirewallError::AlreadyBlocked(ip)) => {
                        // Raced with another scanner or adopted a restart
                        // leftover; expected control flow.
                        logger.debug(&format!("{} is already blocked", ip));
                    }
                    Err(e) => {
                        logger.error(&format!(
                            "failed to install block for {}: {}",
                            decision.source_ip, e
                        ));
                    }
                },
            }
        }
    }

    counter.tick(now);
    outcome
}

/// Run the scan loop for one service until shutdown or `deadline`.
#[allow(clippy::too_many_arguments)]
pub fn run_scanner(
    config: &Config,
    service: &ServiceConfig,
    source: &dyn EventSource,
    policy: &PolicyFilter,
    manager: &FirewallManager,
    clock: &dyn Clock,
    sleeper: &dyn Sleeper,
    shutdown: &dyn ShutdownCheck,
    logger: &dyn Logger,
    deadline: Option<DateTime<Utc>>,
) -> ScannerSummary {
    let parser = EventParser::new();
    let mut counter = WindowCounter::new(config.monitoring.lookback_duration);
    let mut summary = ScannerSummary::default();

    logger.info(&format!(
        "monitoring {} on channel {} (event {})",
        service.name, service.log_channel, service.event_selector
    ));

    loop {
        if shutdown.should_stop() {
            break;
        }
        if let Some(deadline) = deadline {
            if clock.now_utc() >= deadline {
                break;
            }
        }

        let outcome = scan_once(
            config, service, source, &parser, &mut counter, policy, manager, clock, logger,
        );
        summary.accumulate(outcome);

        if shutdown.should_stop() {
            break;
        }
        sleeper.sleep(config.monitoring.check_interval);
    }

    summary
}
