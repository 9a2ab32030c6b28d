//! Structured logging for sysfacts.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSON lines for scripted use
//!
//! # Usage
//!
//! ```ignore
//! use sf_core::logging::{generate_run_id, init_logging, LogConfig};
//!
//! init_logging(&LogConfig::from_env(None));
//! let span = tracing::info_span!("sf", run_id = %generate_run_id());
//! let _enter = span.enter();
//! ```
//!
//! stdout is reserved for fact output; all log output goes to stderr.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel, ENV_LOG_FORMAT, ENV_LOG_LEVEL};

use std::io::IsTerminal;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. `RUST_LOG`,
/// when set, overrides the configured level. A second call is a no-op.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from(config.level).into())
            .parse_lossy("")
    });

    let result = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .with_file(config.source_location)
                .with_line_number(config.source_location);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    // Already initialized (tests, embedding callers).
    let _ = result;
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("run-{}", &uuid.simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();

        assert!(id1.starts_with("run-"));
        assert_ne!(id1, id2);
        // Format: run-<12 hex chars>
        assert_eq!(id1.len(), 16);
        assert!(id1[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig::default().with_level(LogLevel::Off);
        init_logging(&config);
        init_logging(&config);
    }
}
