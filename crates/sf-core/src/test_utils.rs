//! Test utilities for sf-core.
//!
//! This module provides test infrastructure including:
//! - A synthetic host tree (`/sys/block`, `/sys/class/dmi/id`, `/etc`, `/proc`)
//! - A canned tool executor that counts invocations
//! - Tempdir management

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::collect::{ToolError, ToolExecutor, ToolOutput};
use crate::resolvers::HostPaths;

/// Create a temporary directory for testing.
///
/// Uses the `tempfile` crate's TempDir.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

// ============================================================================
// Synthetic host tree
// ============================================================================

/// Builder for a fake host filesystem under a temp directory.
///
/// ```ignore
/// let fixture = SysfsFixture::new()
///     .disk("sda", 4096)
///     .partition("sda", "sda1", 2048);
/// let paths = fixture.paths();
/// ```
pub struct SysfsFixture {
    dir: tempfile::TempDir,
}

impl Default for SysfsFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsFixture {
    /// An empty tree.
    pub fn new() -> Self {
        let dir = temp_dir();
        fs::create_dir_all(dir.path().join("sys/block")).expect("create sys/block");
        Self { dir }
    }

    /// Root of the tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Host paths pointing into this tree.
    pub fn paths(&self) -> HostPaths {
        HostPaths::under(self.root())
    }

    fn block(&self, name: &str) -> PathBuf {
        self.root().join("sys/block").join(name)
    }

    /// Write a file relative to the root, creating parents.
    pub fn file(self, relative: &str, content: &str) -> Self {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write fixture file");
        self
    }

    /// A physical disk: `sys/block/<name>/device` plus a sector count.
    pub fn disk(self, name: &str, sectors: u64) -> Self {
        let block = self.block(name);
        fs::create_dir_all(block.join("device")).expect("create device dir");
        fs::write(block.join("size"), format!("{}\n", sectors)).expect("write size");
        self
    }

    /// A partition directory under a disk.
    pub fn partition(self, disk: &str, name: &str, sectors: u64) -> Self {
        let dir = self.block(disk).join(name);
        fs::create_dir_all(&dir).expect("create partition dir");
        fs::write(dir.join("size"), format!("{}\n", sectors)).expect("write size");
        self
    }

    /// A device-mapper node with an optional `dm/name`.
    pub fn device_mapper(self, name: &str, map_name: Option<&str>, sectors: u64) -> Self {
        let block = self.block(name);
        fs::create_dir_all(block.join("dm")).expect("create dm dir");
        if let Some(map_name) = map_name {
            fs::write(block.join("dm/name"), format!("{}\n", map_name)).expect("write dm name");
        }
        fs::write(block.join("size"), format!("{}\n", sectors)).expect("write size");
        self
    }

    /// A loop device with an optional raw `loop/backing_file` content.
    pub fn loop_device(self, name: &str, backing_file: Option<&str>, sectors: u64) -> Self {
        let block = self.block(name);
        fs::create_dir_all(block.join("loop")).expect("create loop dir");
        if let Some(backing_file) = backing_file {
            fs::write(block.join("loop/backing_file"), backing_file).expect("write backing file");
        }
        fs::write(block.join("size"), format!("{}\n", sectors)).expect("write size");
        self
    }

    /// A block entry with none of the classification markers.
    pub fn unclassified(self, name: &str) -> Self {
        fs::create_dir_all(self.block(name)).expect("create block dir");
        self
    }

    /// One `/sys/class/dmi/id/<attr>` file.
    pub fn dmi(self, attr: &str, value: &str) -> Self {
        self.file(&format!("sys/class/dmi/id/{}", attr), &format!("{}\n", value))
    }

    /// `/proc/meminfo` with the fields the memory resolver reads (kB).
    pub fn meminfo(self, total_kb: u64, available_kb: u64, swap_total_kb: u64, swap_free_kb: u64) -> Self {
        let content = format!(
            "MemTotal:       {} kB\nMemFree:         1024 kB\nMemAvailable:   {} kB\n\
             Buffers:          512 kB\nSwapTotal:      {} kB\nSwapFree:       {} kB\n",
            total_kb, available_kb, swap_total_kb, swap_free_kb
        );
        self.file("proc/meminfo", &content)
    }
}

// ============================================================================
// Canned tools
// ============================================================================

/// [`ToolExecutor`] returning fixed stdout per command.
///
/// `which <name>` succeeds exactly when `<name>` has canned output. Every
/// invocation is counted by command name.
#[derive(Debug, Default)]
pub struct CannedTools {
    outputs: HashMap<String, String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl CannedTools {
    /// No tools available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` available with the given stdout.
    pub fn with_tool(mut self, name: &str, stdout: &str) -> Self {
        self.outputs.insert(name.to_string(), stdout.to_string());
        self
    }

    /// How many times `name` was run.
    pub fn invocations(&self, name: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl ToolExecutor for CannedTools {
    fn run_tool(&self, cmd: &str, args: &[&str]) -> Result<ToolOutput, ToolError> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(cmd.to_string())
            .or_insert(0) += 1;

        if cmd == "which" {
            let target = args.first().copied().unwrap_or_default();
            return Ok(match self.outputs.get(target) {
                Some(_) => ToolOutput::canned(cmd, args, format!("/usr/bin/{}\n", target)),
                None => ToolOutput {
                    exit_code: Some(1),
                    ..ToolOutput::canned(cmd, args, Vec::<u8>::new())
                },
            });
        }

        self.outputs
            .get(cmd)
            .map(|stdout| ToolOutput::canned(cmd, args, stdout.as_bytes()))
            .ok_or_else(|| ToolError::CommandNotFound(cmd.to_string()))
    }
}
