//! Process exit codes.

use crate::commands::CommandError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic runtime failure.
    pub const FAILURE: i32 = 1;
    /// Misconfiguration: bad arguments or an invalid/unreadable config file.
    pub const MISCONFIGURATION: i32 = 2;
    /// Interrupted by signal (128 + SIGINT).
    pub const SIGINT: i32 = 130;
}

/// Map a command error to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_) => codes::MISCONFIGURATION,
        CommandError::Config(_) => codes::MISCONFIGURATION,
        CommandError::ReadConfig { .. } => codes::MISCONFIGURATION,
        CommandError::Firewall(_) => codes::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliError;
    use guardian_engine::{ConfigError, FirewallError};

    #[test]
    fn test_exit_code_invalid_argument() {
        let error = CommandError::InvalidArgument(CliError::InvalidDuration(0));
        assert_eq!(exit_code(&error), codes::MISCONFIGURATION);
    }

    #[test]
    fn test_exit_code_config() {
        let error = CommandError::Config(ConfigError::InvalidThreshold);
        assert_eq!(exit_code(&error), codes::MISCONFIGURATION);
    }

    #[test]
    fn test_exit_code_read_config() {
        let error = CommandError::ReadConfig {
            path: "/etc/guardian.yaml".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(exit_code(&error), codes::MISCONFIGURATION);
    }

    #[test]
    fn test_exit_code_firewall() {
        let error = CommandError::Firewall(FirewallError::NotBlocked("203.0.113.5".parse().unwrap()));
        assert_eq!(exit_code(&error), codes::FAILURE);
    }

    #[test]
    fn test_code_constants() {
        assert_eq!(codes::SUCCESS, 0);
        assert_eq!(codes::FAILURE, 1);
        assert_eq!(codes::MISCONFIGURATION, 2);
        assert_eq!(codes::SIGINT, 130);
    }
}
