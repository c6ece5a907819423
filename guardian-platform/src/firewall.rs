//! Host firewall capability.
//!
//! The firewall's rule table is the only durable state Guardian has: rules
//! survive process restarts, so the backend must support enumeration rich
//! enough for the manager to recognize its own rules again (by the tag
//! substring embedded in every rule description).
//!
//! The Windows implementation shells out to `netsh advfirewall`, mirroring
//! the operations an administrator would run by hand.

use std::net::IpAddr;
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;

/// Errors from host-firewall operations.
#[derive(Debug, Error)]
pub enum FirewallBackendError {
    #[error("failed to run firewall tool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("firewall operation failed with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("firewall output was not valid UTF-8")]
    OutputEncoding(#[from] std::string::FromUtf8Error),
}

/// One rule as reported by the host firewall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    /// Rule name.
    pub name: String,

    /// Rule description. Guardian rules carry the configured tag substring
    /// here.
    pub description: String,

    /// Remote address the rule applies to, when it names exactly one.
    pub remote_ip: Option<IpAddr>,
}

/// Capability to mutate and enumerate host firewall rules.
pub trait FirewallBackend: Send + Sync {
    /// Create an inbound block rule for `remote_ip`.
    fn add_rule(
        &self,
        name: &str,
        remote_ip: IpAddr,
        description: &str,
    ) -> Result<(), FirewallBackendError>;

    /// Delete a rule by name.
    fn delete_rule(&self, name: &str) -> Result<(), FirewallBackendError>;

    /// Enumerate all rules.
    fn list_rules(&self) -> Result<Vec<RuleRecord>, FirewallBackendError>;
}

/// Parse `netsh advfirewall firewall show rule` verbose output.
///
/// The listing is a sequence of `Key:  value` lines; a `Rule Name:` line
/// starts a new record. `RemoteIP` values carry a netmask suffix
/// (`203.0.113.5/255.255.255.255` or `2001:db8::1/128`) which is stripped.
pub fn parse_rule_listing(output: &str) -> Vec<RuleRecord> {
    let mut rules = Vec::new();
    let mut current: Option<RuleRecord> = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "Rule Name" => {
                if let Some(rule) = current.take() {
                    rules.push(rule);
                }
                current = Some(RuleRecord {
                    name: value.to_string(),
                    description: String::new(),
                    remote_ip: None,
                });
            }
            "Description" => {
                if let Some(rule) = current.as_mut() {
                    rule.description = value.to_string();
                }
            }
            "RemoteIP" => {
                if let Some(rule) = current.as_mut() {
                    let literal = value.split('/').next().unwrap_or(value);
                    rule.remote_ip = literal.parse().ok();
                }
            }
            _ => {}
        }
    }

    if let Some(rule) = current {
        rules.push(rule);
    }

    rules
}

/// Firewall backend using Windows Firewall via `netsh advfirewall`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsFirewall;

impl WindowsFirewall {
    /// Create a new Windows firewall backend.
    pub fn new() -> Self {
        Self
    }

    fn run(args: &[String]) -> Result<Vec<u8>, FirewallBackendError> {
        let output = Command::new("netsh").args(args).output()?;

        if !output.status.success() {
            return Err(FirewallBackendError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl FirewallBackend for WindowsFirewall {
    fn add_rule(
        &self,
        name: &str,
        remote_ip: IpAddr,
        description: &str,
    ) -> Result<(), FirewallBackendError> {
        Self::run(&[
            "advfirewall".to_string(),
            "firewall".to_string(),
            "add".to_string(),
            "rule".to_string(),
            format!("name={}", name),
            "dir=in".to_string(),
            "action=block".to_string(),
            format!("remoteip={}", remote_ip),
            format!("description={}", description),
        ])
        .map(|_| ())
    }

    fn delete_rule(&self, name: &str) -> Result<(), FirewallBackendError> {
        Self::run(&[
            "advfirewall".to_string(),
            "firewall".to_string(),
            "delete".to_string(),
            "rule".to_string(),
            format!("name={}", name),
        ])
        .map(|_| ())
    }

    fn list_rules(&self) -> Result<Vec<RuleRecord>, FirewallBackendError> {
        let stdout = Self::run(&[
            "advfirewall".to_string(),
            "firewall".to_string(),
            "show".to_string(),
            "rule".to_string(),
            "name=all".to_string(),
            "verbose".to_string(),
        ])?;

        let text = String::from_utf8(stdout)?;
        Ok(parse_rule_listing(&text))
    }
}

/// In-memory firewall backend for tests.
///
/// Rules can be pre-seeded to simulate state left behind by a previous
/// process, and individual operations can be scripted to fail.
#[derive(Debug, Default)]
pub struct MockFirewall {
    rules: Mutex<Vec<RuleRecord>>,
    fail_add: AtomicBool,
    fail_delete: AtomicBool,
    fail_list: AtomicBool,
    delete_calls: AtomicUsize,
}

impl MockFirewall {
    /// Create an empty mock firewall.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a rule, as if created by an earlier process.
    pub fn seed_rule(
        &self,
        name: impl Into<String>,
        remote_ip: Option<IpAddr>,
        description: impl Into<String>,
    ) {
        self.rules.lock().unwrap().push(RuleRecord {
            name: name.into(),
            description: description.into(),
            remote_ip,
        });
    }

    /// Snapshot of current rules.
    pub fn rules(&self) -> Vec<RuleRecord> {
        self.rules.lock().unwrap().clone()
    }

    /// True when a rule with the given name exists.
    pub fn contains_rule(&self, name: &str) -> bool {
        self.rules.lock().unwrap().iter().any(|r| r.name == name)
    }

    /// Number of rules currently present.
    pub fn rule_count(&self) -> usize {
        self.rules.lock().unwrap().len()
    }

    /// Number of delete attempts observed, including failed ones.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Script add_rule to fail.
    pub fn set_fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    /// Script delete_rule to fail.
    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Script list_rules to fail.
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    fn simulated_failure(what: &str) -> FirewallBackendError {
        FirewallBackendError::Failed {
            status: 1,
            stderr: format!("simulated {} failure", what),
        }
    }
}

impl FirewallBackend for MockFirewall {
    fn add_rule(
        &self,
        name: &str,
        remote_ip: IpAddr,
        description: &str,
    ) -> Result<(), FirewallBackendError> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Self::simulated_failure("add"));
        }

        self.rules.lock().unwrap().push(RuleRecord {
            name: name.to_string(),
            description: description.to_string(),
            remote_ip: Some(remote_ip),
        });
        Ok(())
    }

    fn delete_rule(&self, name: &str) -> Result<(), FirewallBackendError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::simulated_failure("delete"));
        }

        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|r| r.name != name);

        if rules.len() == before {
            return Err(FirewallBackendError::Failed {
                status: 1,
                stderr: format!("no rule named {}", name),
            });
        }

        Ok(())
    }

    fn list_rules(&self) -> Result<Vec<RuleRecord>, FirewallBackendError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::simulated_failure("list"));
        }

        Ok(self.rules.lock().unwrap().clone())
    }
}
