//! Firewall manager: the authoritative store of active blocks.
//!
//! Firewall rules survive process restarts, which makes the rule table the
//! only durable state in the system. The manager keeps an in-memory mirror
//! of the blocks it owns, tags every rule description so it can recognize
//! its own rules after a restart, and retries failed deletions on the next
//! sweep. All public operations are serialized by one lock; the sweeper
//! takes the same lock.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use guardian_platform::{FirewallBackend, FirewallBackendError};
use guardian_schema::ActiveBlock;
use thiserror::Error;

use crate::config::{generate_rule_name, BlockingConfig};

/// Errors from block operations.
#[derive(Debug, Error)]
pub enum FirewallError {
    /// Expected control-flow signal, not logged as an error.
    #[error("{0} is already blocked")]
    AlreadyBlocked(IpAddr),

    #[error("{0} is not blocked")]
    NotBlocked(IpAddr),

    #[error("invalid IP address '{0}'")]
    InvalidIp(String),

    /// Transient host-firewall failure; the next scan or sweep retries.
    #[error("firewall operation failed: {0}")]
    Backend(#[from] FirewallBackendError),
}

/// Rule materialization settings, extracted from the blocking configuration.
#[derive(Debug, Clone)]
pub struct RuleSettings {
    /// Rule name template with `{app}`/`{ip}`/`{service}`/`{timestamp}`
    /// placeholders.
    pub name_template: String,

    /// Substring embedded in every rule description.
    pub tag: String,

    /// Block lifetime. Zero means permanent.
    pub block_duration: StdDuration,
}

impl From<&BlockingConfig> for RuleSettings {
    fn from(config: &BlockingConfig) -> Self {
        Self {
            name_template: config.rule_name_template.clone(),
            tag: config.rule_tag.clone(),
            block_duration: config.block_duration,
        }
    }
}

/// Result of one expiration sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Blocks whose rules were deleted.
    pub removed: Vec<ActiveBlock>,

    /// Blocks whose rule deletion failed; retained for the next sweep.
    pub failed: Vec<(IpAddr, FirewallError)>,
}

impl SweepReport {
    /// True when nothing expired and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Installs, tracks, and removes block rules.
pub struct FirewallManager {
    backend: Arc<dyn FirewallBackend>,
    settings: RuleSettings,
    blocks: Mutex<HashMap<IpAddr, ActiveBlock>>,
}

impl FirewallManager {
    /// Create a manager over a firewall backend.
    pub fn new(backend: Arc<dyn FirewallBackend>, settings: RuleSettings) -> Self {
        Self {
            backend,
            settings,
            blocks: Mutex::new(HashMap::new()),
        }
    }

    /// Install a block for `ip` with the configured duration.
    ///
    /// Fails with `AlreadyBlocked` when an unexpired block exists, or when a
    /// tagged rule for `ip` already exists in the firewall (the post-restart
    /// path: the rule is adopted into the in-memory set first). On backend
    /// failure no state is recorded.
    pub fn install(
        &self,
        ip: IpAddr,
        service: &str,
        reason: &str,
        attack_count: usize,
        now: DateTime<Utc>,
    ) -> Result<ActiveBlock, FirewallError> {
        let mut blocks = self.blocks.lock().unwrap();

        if let Some(existing) = blocks.get(&ip) {
            if !existing.is_expired(now) {
                return Err(FirewallError::AlreadyBlocked(ip));
            }
        }

        // A tagged rule for this address may survive from a previous run.
        // Adopt it instead of stacking a second rule on top.
        let rules = self.backend.list_rules()?;
        if let Some(rule) = rules
            .iter()
            .find(|r| r.remote_ip == Some(ip) && r.description.contains(&self.settings.tag))
        {
            blocks.insert(ip, self.adopted_block(ip, rule.name.clone(), now));
            return Err(FirewallError::AlreadyBlocked(ip));
        }

        let rule_name = generate_rule_name(&self.settings.name_template, ip, service, now);
        let description = format!("{}: {}", self.settings.tag, reason);

        self.backend.add_rule(&rule_name, ip, &description)?;

        let block = ActiveBlock {
            source_ip: ip,
            rule_name,
            created_at: now,
            expires_at: self.lease(now),
            reason: reason.to_string(),
            service: service.to_string(),
            attack_count,
        };
        blocks.insert(ip, block.clone());

        Ok(block)
    }

    /// Remove the block for `ip`.
    ///
    /// Deletes the firewall rule by its stored name. On backend failure the
    /// record is retained so the sweeper retries deletion.
    pub fn remove(&self, ip: IpAddr) -> Result<ActiveBlock, FirewallError> {
        let mut blocks = self.blocks.lock().unwrap();

        let block = blocks
            .get(&ip)
            .cloned()
            .ok_or(FirewallError::NotBlocked(ip))?;

        self.backend.delete_rule(&block.rule_name)?;
        blocks.remove(&ip);

        Ok(block)
    }

    /// Delete every expired block's rule. Failures are collected, not fatal:
    /// the affected records stay active-stale and are retried next sweep.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut blocks = self.blocks.lock().unwrap();
        let mut report = SweepReport::default();

        let expired: Vec<(IpAddr, ActiveBlock)> = blocks
            .iter()
            .filter(|(_, block)| block.is_expired(now))
            .map(|(ip, block)| (*ip, block.clone()))
            .collect();

        for (ip, block) in expired {
            match self.backend.delete_rule(&block.rule_name) {
                Ok(()) => {
                    blocks.remove(&ip);
                    report.removed.push(block);
                }
                Err(e) => {
                    report.failed.push((ip, FirewallError::Backend(e)));
                }
            }
        }

        report.removed.sort_by_key(|b| b.source_ip);
        report.failed.sort_by_key(|(ip, _)| *ip);
        report
    }

    /// Snapshot of active, unexpired blocks, in address order.
    pub fn list(&self, now: DateTime<Utc>) -> Vec<ActiveBlock> {
        let blocks = self.blocks.lock().unwrap();
        let mut active: Vec<ActiveBlock> = blocks
            .values()
            .filter(|block| !block.is_expired(now))
            .cloned()
            .collect();
        active.sort_by_key(|b| b.source_ip);
        active
    }

    /// True when an unexpired block exists for `ip`.
    pub fn is_blocked(&self, ip: IpAddr, now: DateTime<Utc>) -> bool {
        self.blocks
            .lock()
            .unwrap()
            .get(&ip)
            .map(|block| !block.is_expired(now))
            .unwrap_or(false)
    }

    /// Number of unexpired blocks.
    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.blocks
            .lock()
            .unwrap()
            .values()
            .filter(|block| !block.is_expired(now))
            .count()
    }

    /// Adopt rules left behind by a previous run.
    ///
    /// Scans the firewall for rules whose description contains the tag and
    /// whose remote address is known; each becomes an active block with a
    /// fresh lease. Returns the adopted blocks.
    pub fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<ActiveBlock>, FirewallError> {
        let rules = self.backend.list_rules()?;
        let mut blocks = self.blocks.lock().unwrap();
        let mut adopted = Vec::new();

        for rule in rules {
            let Some(ip) = rule.remote_ip else { continue };
            if !rule.description.contains(&self.settings.tag) {
                continue;
            }
            if blocks.get(&ip).map(|b| !b.is_expired(now)).unwrap_or(false) {
                continue;
            }

            let block = self.adopted_block(ip, rule.name, now);
            blocks.insert(ip, block.clone());
            adopted.push(block);
        }

        adopted.sort_by_key(|b| b.source_ip);
        Ok(adopted)
    }

    fn adopted_block(&self, ip: IpAddr, rule_name: String, now: DateTime<Utc>) -> ActiveBlock {
        ActiveBlock {
            source_ip: ip,
            rule_name,
            created_at: now,
            expires_at: self.lease(now),
            reason: "adopted existing firewall rule".to_string(),
            service: "unknown".to_string(),
            attack_count: 0,
        }
    }

    fn lease(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.settings.block_duration.is_zero() {
            None
        } else {
            let duration = Duration::from_std(self.settings.block_duration)
                .unwrap_or_else(|_| Duration::max_value());
            Some(now + duration)
        }
    }
}

impl std::fmt::Debug for FirewallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirewallManager")
            .field("settings", &self.settings)
            .field("active", &self.blocks.lock().unwrap().len())
            .finish()
    }
}
