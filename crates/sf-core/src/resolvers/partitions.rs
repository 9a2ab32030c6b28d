//! Block-device partition enumeration.
//!
//! Walks the block device tree (`/sys/block`), classifies each entry, and
//! joins every device found with its `blkid` attributes. The result is one
//! [`PartitionRecord`] per device path:
//!
//! ```json
//! {
//!   "/dev/sda1": { "size_bytes": 1048576, "size_human": "1.0 MiB", "filesystem": "ext4", "uuid": "abc" },
//!   "/dev/loop0": { "size_bytes": 4096, "size_human": "4.0 KiB", "backing_file": "/data/disk.img" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::blkid::BlkidProbe;
use super::{Resolver, ResolverKind};
use crate::bytes::bytes_to_human;
use crate::collect::{read_trimmed, ToolExecutor, ToolRunner};
use crate::memo::FactMemo;

/// Default block device root.
pub const BLOCK_ROOT: &str = "/sys/block";

/// Bytes per sector in sysfs `size` files.
const SECTOR_BYTES: u64 = 512;

/// How a block device entry was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Has a `device` link; partitions live in sub-directories.
    Physical,
    /// Has a `dm` directory.
    DeviceMapper,
    /// Has a `loop` directory.
    Loop,
    /// None of the above; skipped.
    Unknown,
}

impl DeviceKind {
    /// Classify a `/sys/block/<entry>` directory.
    ///
    /// Markers are checked in order, so an entry with both `device` and `dm`
    /// is physical.
    pub fn classify(block_path: &Path) -> Self {
        if block_path.join("device").is_dir() {
            DeviceKind::Physical
        } else if block_path.join("dm").is_dir() {
            DeviceKind::DeviceMapper
        } else if block_path.join("loop").is_dir() {
            DeviceKind::Loop
        } else {
            DeviceKind::Unknown
        }
    }
}

/// One partition (or whole device) in the `partitions` fact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub size_bytes: u64,
    pub size_human: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_label: Option<String>,
}

impl PartitionRecord {
    /// A record with only the size filled in.
    pub fn with_size(size_bytes: u64) -> Self {
        Self {
            size_bytes,
            size_human: bytes_to_human(size_bytes),
            ..Self::default()
        }
    }
}

/// Resolver for the `partitions` fact.
pub struct PartitionResolver {
    block_root: PathBuf,
    blkid: BlkidProbe,
    memo: FactMemo,
}

impl std::fmt::Debug for PartitionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionResolver")
            .field("block_root", &self.block_root)
            .field("blkid", &self.blkid)
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<PartitionResolver>> = OnceLock::new();

impl PartitionResolver {
    /// The fact this resolver produces.
    pub const FACT: &'static str = "partitions";

    /// A resolver over `block_root`, running `blkid` through `tools`.
    pub fn new(block_root: impl Into<PathBuf>, tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            block_root: block_root.into(),
            blkid: BlkidProbe::new(tools),
            memo: FactMemo::new(),
        }
    }

    /// The process-wide instance over `/sys/block`.
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| {
                Arc::new(Self::new(BLOCK_ROOT, Arc::new(ToolRunner::with_defaults())))
            })
            .clone()
    }

    /// Enumerate every partition; not memoized.
    pub fn read_partitions(&self) -> BTreeMap<String, PartitionRecord> {
        let mut partitions = BTreeMap::new();

        let entries = match fs::read_dir(&self.block_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.block_root.display(), error = %e, "block root unreadable");
                return partitions;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();

        for name in names {
            let block_path = self.block_root.join(&name);
            let kind = DeviceKind::classify(&block_path);
            trace!(device = %name, kind = ?kind, "classified block device");

            match kind {
                DeviceKind::Physical => {
                    for subdir in partition_dirs(&block_path, &name) {
                        if let Some(part) = subdir.file_name().map(|n| n.to_string_lossy().to_string()) {
                            let record = self.build_record(&format!("/dev/{}", part), &subdir, None);
                            partitions.insert(format!("/dev/{}", part), record);
                        }
                    }
                }
                DeviceKind::DeviceMapper => {
                    let device_path = match read_trimmed(&block_path.join("dm/name")) {
                        Some(map_name) => format!("/dev/mapper/{}", map_name),
                        None => format!("/dev/{}", name),
                    };
                    let record = self.build_record(&device_path, &block_path, None);
                    partitions.insert(device_path, record);
                }
                DeviceKind::Loop => {
                    let device_path = format!("/dev/{}", name);
                    let backing_file = read_trimmed(&block_path.join("loop/backing_file"));
                    let record = self.build_record(&device_path, &block_path, backing_file);
                    partitions.insert(device_path, record);
                }
                DeviceKind::Unknown => {}
            }
        }

        debug!(count = partitions.len(), "enumerated partitions");
        partitions
    }

    fn build_record(
        &self,
        device_path: &str,
        sys_path: &Path,
        backing_file: Option<String>,
    ) -> PartitionRecord {
        let mut record = PartitionRecord::with_size(read_size_bytes(sys_path));
        record.backing_file = backing_file;

        if let Some(attrs) = self.blkid.device(device_path) {
            record.filesystem = attrs.get("TYPE").cloned();
            record.uuid = attrs.get("UUID").cloned();
            record.label = attrs.get("LABEL").cloned();
            record.part_uuid = attrs.get("PARTUUID").cloned();
            record.part_label = attrs.get("PARTLABEL").cloned();
        }

        record
    }
}

impl Resolver for PartitionResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Partitions
    }

    fn resolve(&self, fact: &str) -> Option<Value> {
        self.memo.fetch_or_resolve(fact, |entries| {
            if fact == Self::FACT {
                entries.insert_serialized(Self::FACT, &self.read_partitions());
            }
        })
    }
}

/// `size` in sectors, as bytes; 0 when unreadable.
fn read_size_bytes(sys_path: &Path) -> u64 {
    read_trimmed(&sys_path.join("size"))
        .and_then(|s| s.parse::<u64>().ok())
        .map(|sectors| sectors.saturating_mul(SECTOR_BYTES))
        .unwrap_or(0)
}

/// Sub-directories of a physical device whose name contains the device
/// name, at any depth. Symlinks are not followed.
fn partition_dirs(block_path: &Path, device: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![block_path.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let path = entry.path();
            if entry.file_name().to_string_lossy().contains(device) {
                found.push(path.clone());
            }
            pending.push(path);
        }
    }

    found.sort();
    found
}
