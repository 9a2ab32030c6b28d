//! Collection primitives shared by the resolvers.
//!
//! - Tool runner for safe external command execution
//! - Small sysfs/procfs file readers

pub mod tool_runner;

pub use tool_runner::{
    ToolConfig, ToolError, ToolExecutor, ToolOutput, ToolRunner, DEFAULT_MAX_OUTPUT_BYTES,
};

use std::fs;
use std::path::Path;

/// Read a small text file and trim surrounding whitespace.
///
/// Returns `None` when the file is unreadable or empty after trimming.
pub fn read_trimmed(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
