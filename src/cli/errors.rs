//! CLI error types
//!
//! Every CLI error ends the process. The code decides the exit status,
//! following the sysexits convention.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Successful termination
pub const EX_OK: i32 = 0;
/// Command line usage error, reported by the argument parser
pub const EX_USAGE: i32 = 64;
/// Internal or domain failure
pub const EX_SOFTWARE: i32 = 70;
/// Configuration error
pub const EX_CONFIG: i32 = 78;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    Config,
    /// Boot control call failed
    CommandFailed,
    /// Boolean query answered false
    CheckFalse,
    /// Writing command output failed
    Io,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config => "BOOTCTL_CLI_CONFIG_ERROR",
            Self::CommandFailed => "BOOTCTL_CLI_COMMAND_FAILED",
            Self::CheckFalse => "BOOTCTL_CLI_CHECK_FALSE",
            Self::Io => "BOOTCTL_CLI_IO_ERROR",
        }
    }

    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Config => EX_CONFIG,
            Self::CommandFailed | Self::CheckFalse | Self::Io => EX_SOFTWARE,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Config, msg)
    }

    /// `Error <doing>: <cause>`
    pub fn command_failed(doing: &str, cause: impl fmt::Display) -> Self {
        Self::new(CliErrorCode::CommandFailed, format!("Error {}: {}", doing, cause))
    }

    /// Query answered false; reported through the exit status alone
    pub fn check_false() -> Self {
        Self::new(CliErrorCode::CheckFalse, "")
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_status(&self) -> i32 {
        self.code.exit_status()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::new(CliErrorCode::Io, format!("Error writing output: {}", e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(CliErrorCode::Io, format!("Error encoding metadata: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(CliError::config_error("x").exit_status(), EX_CONFIG);
        assert_eq!(CliError::check_false().exit_status(), EX_SOFTWARE);
        assert_eq!(
            CliError::command_failed("setting active boot slot", "Invalid slot").exit_status(),
            EX_SOFTWARE
        );
    }

    #[test]
    fn test_command_failed_message() {
        let err = CliError::command_failed("setting active boot slot", "Invalid slot 3");
        assert_eq!(err.message(), "Error setting active boot slot: Invalid slot 3");
        assert_eq!(err.code().code(), "BOOTCTL_CLI_COMMAND_FAILED");
    }

    #[test]
    fn test_check_false_is_silent() {
        assert!(CliError::check_false().message().is_empty());
    }
}
