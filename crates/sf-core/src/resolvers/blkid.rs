//! `blkid` probing and output parsing.
//!
//! `blkid` prints one line per block device:
//!
//! ```text
//! /dev/sda1: UUID="3e6be9de" BLOCK_SIZE="4096" TYPE="ext4" PARTUUID="6c52a3a7-01"
//! ```
//!
//! The probe checks for the tool once per process and runs it at most once;
//! both results are kept for the lifetime of the probe, including a negative
//! availability answer.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::collect::ToolExecutor;

/// Device path → attribute name → value.
pub type BlkidTable = HashMap<String, HashMap<String, String>>;

/// `KEY="VALUE"` pairs.
static PAIR_PATTERN: OnceLock<Regex> = OnceLock::new();

fn pair_pattern() -> &'static Regex {
    PAIR_PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z0-9_]+)="([^"]*)""#).expect("blkid attribute pattern is valid")
    })
}

/// Parse `blkid` output into a [`BlkidTable`].
///
/// Lines without a `device:` prefix are ignored. A device listed twice keeps
/// the attributes of its last line.
pub fn parse_blkid_output(output: &str) -> BlkidTable {
    let mut table = BlkidTable::new();

    for line in output.lines() {
        let Some((device, attrs)) = line.split_once(':') else {
            continue;
        };
        let device = device.trim();
        if device.is_empty() {
            continue;
        }

        let attrs: HashMap<String, String> = pair_pattern()
            .captures_iter(attrs)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect();

        table.insert(device.to_string(), attrs);
    }

    table
}

/// Lazily probes for and runs `blkid`.
pub struct BlkidProbe {
    tools: Arc<dyn ToolExecutor>,
    available: OnceLock<bool>,
    table: OnceLock<BlkidTable>,
}

impl std::fmt::Debug for BlkidProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlkidProbe")
            .field("available", &self.available.get())
            .field("devices", &self.table.get().map(HashMap::len))
            .finish()
    }
}

impl BlkidProbe {
    /// Create a probe that runs tools through `tools`.
    pub fn new(tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            tools,
            available: OnceLock::new(),
            table: OnceLock::new(),
        }
    }

    /// Whether `blkid` is on `PATH`. Checked once.
    pub fn is_available(&self) -> bool {
        *self.available.get_or_init(|| {
            let found = self.tools.command_exists("blkid");
            debug!(found, "probed for blkid");
            found
        })
    }

    /// The parsed `blkid` output; empty when the tool is absent or fails.
    pub fn table(&self) -> &BlkidTable {
        self.table.get_or_init(|| {
            if !self.is_available() {
                return BlkidTable::new();
            }

            match self.tools.run_tool("blkid", &[]) {
                // blkid exits 2 when it finds nothing, but whatever it
                // printed is still usable.
                Ok(output) => {
                    let table = parse_blkid_output(&output.stdout_str());
                    debug!(devices = table.len(), exit_code = ?output.exit_code, "parsed blkid output");
                    table
                }
                Err(e) => {
                    warn!(error = %e, "blkid failed");
                    BlkidTable::new()
                }
            }
        })
    }

    /// Attributes for one device.
    pub fn device(&self, device: &str) -> Option<&HashMap<String, String>> {
        self.table().get(device)
    }
}
