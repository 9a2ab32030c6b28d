//! Exit codes for the `sf` CLI.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)
//!
//! A fact that cannot be resolved is not an error; it is reported as absent
//! and the run still exits cleanly.

use sf_common::error::ErrorCategory;
use sf_common::Error;

/// Exit codes for sf operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration file missing, unreadable, or invalid
    ConfigError = 11,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            // Serializing our own values should never fail.
            Error::Json(_) | Error::Output(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io | ErrorCategory::Cache => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::ArgsError.is_user_error());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert!(!ExitCode::InternalError.is_user_error());
    }

    #[test]
    fn test_from_error() {
        assert_eq!(
            ExitCode::from(&Error::InvalidConfig("bad ttl".into())),
            ExitCode::ConfigError
        );
        assert_eq!(ExitCode::from(&Error::Cache("full".into())), ExitCode::IoError);
        assert_eq!(
            ExitCode::from(&Error::Output("yaml".into())),
            ExitCode::InternalError
        );
        let io = Error::Io(std::io::Error::other("disk full"));
        assert_eq!(ExitCode::from(&io), ExitCode::IoError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::ConfigError.to_string(), "ERR_CONFIG (11)");
    }
}
