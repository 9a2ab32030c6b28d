//! Tool runner with output cap and command validation.
//!
//! This module provides safe execution of the external diagnostic tools the
//! resolvers depend on (`blkid`, `which`):
//!
//! - Sanitised environment (`env_clear`, `PATH`, `LC_ALL=C`) so output is
//!   locale-independent and parseable
//! - Output size caps to prevent memory exhaustion
//! - Command validation to prevent injection
//!
//! There is no timeout: a tool runs to completion. Resolvers call tools
//! through the [`ToolExecutor`] trait so tests can substitute canned output.
//!
//! # Example
//!
//! ```ignore
//! use sf_core::collect::{ToolExecutor, ToolRunner};
//!
//! let runner = ToolRunner::with_defaults();
//! let output = runner.run_tool("blkid", &[])?;
//! println!("{}", output.stdout_str());
//! ```

use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, instrument, trace, warn};

/// Default maximum output size in bytes (4MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid command path: {0}")]
    InvalidPath(String),
}

/// Output from a tool execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Command that was executed.
    pub command: String,

    /// Arguments passed to the command.
    pub args: Vec<String>,

    /// Standard output (may be truncated).
    pub stdout: Vec<u8>,

    /// Standard error (may be truncated).
    pub stderr: Vec<u8>,

    /// Exit code (if available).
    pub exit_code: Option<i32>,

    /// Whether output was truncated.
    pub truncated: bool,

    /// Execution duration.
    pub duration: Duration,
}

impl ToolOutput {
    /// Build a successful output carrying `stdout`, for canned executors.
    pub fn canned(command: &str, args: &[&str], stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Get stdout as string (lossy UTF-8 conversion).
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Anything that can run an external tool.
pub trait ToolExecutor: Send + Sync {
    /// Run `cmd` with `args` and capture its output.
    fn run_tool(&self, cmd: &str, args: &[&str]) -> Result<ToolOutput, ToolError>;

    /// Whether `name` is on `PATH`, as reported by `which`.
    fn command_exists(&self, name: &str) -> bool {
        match self.run_tool("which", &[name]) {
            Ok(output) if output.success() => !output.stdout_str().trim().is_empty(),
            Ok(_) => {
                trace!(tool = name, "not found");
                false
            }
            Err(e) => {
                debug!(tool = name, error = %e, "which failed");
                false
            }
        }
    }
}

/// Configuration for the tool runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Maximum output size per stream in bytes.
    pub max_output_bytes: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Runs tools as child processes.
#[derive(Debug, Default)]
pub struct ToolRunner {
    config: ToolConfig,
}

impl ToolRunner {
    /// Create a new tool runner with the given configuration.
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    /// Create a tool runner with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ToolConfig::default())
    }

    /// Validate that a command is safe to execute.
    fn validate_command(&self, cmd: &str) -> Result<(), ToolError> {
        if cmd.is_empty() || cmd.contains(['|', '&', ';', '$', '`', '\n', '\r', ' ']) {
            return Err(ToolError::InvalidPath(format!(
                "command contains shell metacharacters: {:?}",
                cmd
            )));
        }

        if cmd.starts_with('/') && !Path::new(cmd).exists() {
            return Err(ToolError::CommandNotFound(cmd.to_string()));
        }

        Ok(())
    }

    /// Build the command with a minimal, locale-neutral environment.
    fn build_command(&self, cmd: &str, args: &[&str]) -> Command {
        let mut command = Command::new(cmd);
        command.args(args);

        command.env_clear();
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }
        command.env("LC_ALL", "C");
        command.env("LANG", "C");

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl ToolExecutor for ToolRunner {
    #[instrument(skip(self), fields(cmd = %cmd))]
    fn run_tool(&self, cmd: &str, args: &[&str]) -> Result<ToolOutput, ToolError> {
        self.validate_command(cmd)?;

        let max_output = self.config.max_output_bytes;
        debug!(command = %cmd, args = ?args, max_output, "running tool");

        let start = Instant::now();
        let mut child = self.build_command(cmd, args).spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ToolError::CommandNotFound(cmd.to_string())
            } else {
                error!(command = %cmd, error = %e, "failed to spawn");
                ToolError::SpawnFailed(e.to_string())
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes are drained concurrently so neither can fill and stall
        // the child.
        let (stdout, stderr) = thread::scope(|s| {
            let err_handle = s.spawn(move || read_capped(stderr, max_output));
            let out = read_capped(stdout, max_output);
            let err = err_handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stderr reader panicked")));
            (out, err)
        });
        let (stdout, stdout_truncated) = stdout?;
        let (stderr, stderr_truncated) = stderr?;

        let status = child.wait()?;
        let duration = start.elapsed();
        let truncated = stdout_truncated || stderr_truncated;
        if truncated {
            warn!(command = %cmd, limit = max_output, "tool output truncated");
        }

        debug!(
            command = %cmd,
            duration_ms = duration.as_millis() as u64,
            exit_code = ?status.code(),
            "tool execution complete"
        );

        Ok(ToolOutput {
            command: cmd.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            stdout,
            stderr,
            exit_code: status.code(),
            truncated,
            duration,
        })
    }
}

/// Read up to `max` bytes, then discard the remainder.
///
/// Returns the captured bytes and whether anything was discarded.
fn read_capped<R: Read>(stream: Option<R>, max: usize) -> io::Result<(Vec<u8>, bool)> {
    let Some(mut stream) = stream else {
        return Ok((Vec::new(), false));
    };

    let mut buf = Vec::with_capacity(max.min(65536));
    stream.by_ref().take(max as u64).read_to_end(&mut buf)?;
    let discarded = io::copy(&mut stream, &mut io::sink())?;
    Ok((buf, discarded > 0))
}
