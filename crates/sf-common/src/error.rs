//! Error types for sysfacts.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Remediation hints for humans
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 11,
//!   "category": "config",
//!   "message": "invalid configuration: unknown cache group in ttls: disks",
//!   "recoverable": true
//! }
//! ```
//!
//! Unreadable OS resources are not errors at all: resolvers report them as
//! absent facts. Only configuration, cache I/O and output failures surface
//! here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for sysfacts operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors (ttls, groups).
    Config,
    /// Persistent fact cache errors.
    Cache,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Cache => write!(f, "cache"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for sysfacts.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Cache errors (30-39)
    #[error("fact cache error: {0}")]
    Cache(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("output rendering failed: {0}")]
    Output(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 30-39: Cache errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::Cache(_) => 30,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Output(_) => 62,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::Cache(_) => ErrorCategory::Cache,
            Error::Io(_) | Error::Json(_) | Error::Output(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => true,
            // A broken cache can always be cleared.
            Error::Cache(_) => true,
            Error::Io(_) => true,
            Error::Json(_) | Error::Output(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => {
                "Check sysfacts.json: ttls must name known cache groups and use durations like '1d' or '30min'."
            }
            Error::Cache(_) => "Run 'sf cache clear' to drop cached facts, or rerun with --no-cache.",
            Error::Io(_) => "Check permissions on the cache and config directories and retry.",
            Error::Json(_) => "Invalid JSON. Check the file with 'jq .' or delete it.",
            Error::Output(_) => "Try a different --format.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig(_) => "Invalid Configuration",
            Error::Cache(_) => "Fact Cache Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
            Error::Output(_) => "Output Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Remediation hint.
    pub remediation: String,

    /// Additional structured context (e.g., file path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
            context: HashMap::new(),
        }
    }
}

impl StructuredError {
    /// Attach a context value.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Format for a human reader: headline, reason, fix.
    pub fn human(err: &Error) -> String {
        format!(
            "✗ {}\n  Reason: {}\n  Fix: {}",
            err.headline(),
            err,
            err.remediation()
        )
    }
}
