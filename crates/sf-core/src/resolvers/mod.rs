//! Fact resolvers.
//!
//! A resolver reads one OS resource and answers fact lookups from it. Every
//! resolver memoizes through its own [`FactMemo`](crate::memo::FactMemo), so
//! a resource is read at most once per resolver instance. Unreadable
//! resources resolve to `None`, never to an error.
//!
//! The process-wide instances are `OnceLock` singletons reachable through
//! each resolver's `global()` and bundled by [`ResolverSet::system`]. Tests
//! build private instances rooted in a fixture tree with
//! [`ResolverSet::new`].

pub mod blkid;
pub mod dmi;
pub mod memory;
pub mod os;
pub mod partitions;

pub use blkid::{parse_blkid_output, BlkidProbe, BlkidTable};
pub use dmi::DmiResolver;
pub use memory::{parse_meminfo_content, MemoryResolver};
pub use os::{DebianVersionResolver, OsReleaseResolver};
pub use partitions::{DeviceKind, PartitionRecord, PartitionResolver};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collect::ToolExecutor;

/// A memoizing fact source.
pub trait Resolver: Send + Sync {
    /// Which resolver this is.
    fn kind(&self) -> ResolverKind;

    /// Resolve a fact by its resolver-local key.
    fn resolve(&self, fact: &str) -> Option<Value>;
}

/// The resolvers known to the fact catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// `/sys/class/dmi/id`
    Dmi,
    /// `/etc/debian_version`
    DebianVersion,
    /// `/etc/os-release`
    OsRelease,
    /// `/proc/meminfo`
    Memory,
    /// `/sys/block` joined with `blkid`
    Partitions,
}

impl ResolverKind {
    /// All resolver kinds.
    pub const ALL: [ResolverKind; 5] = [
        ResolverKind::Dmi,
        ResolverKind::DebianVersion,
        ResolverKind::OsRelease,
        ResolverKind::Memory,
        ResolverKind::Partitions,
    ];
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverKind::Dmi => write!(f, "dmi"),
            ResolverKind::DebianVersion => write!(f, "debian_version"),
            ResolverKind::OsRelease => write!(f, "os_release"),
            ResolverKind::Memory => write!(f, "memory"),
            ResolverKind::Partitions => write!(f, "partitions"),
        }
    }
}

/// Locations of the OS resources the resolvers read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Block device tree, `/sys/block`.
    pub block_root: PathBuf,
    /// DMI class directory, `/sys/class/dmi`.
    pub dmi_root: PathBuf,
    /// `/etc/debian_version`.
    pub debian_version: PathBuf,
    /// `/etc/os-release`.
    pub os_release: PathBuf,
    /// `/proc/meminfo`.
    pub meminfo: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self::under(Path::new("/"))
    }
}

impl HostPaths {
    /// The standard layout below `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            block_root: root.join("sys/block"),
            dmi_root: root.join("sys/class/dmi"),
            debian_version: root.join("etc/debian_version"),
            os_release: root.join("etc/os-release"),
            meminfo: root.join("proc/meminfo"),
        }
    }
}

/// One instance of every resolver.
#[derive(Clone)]
pub struct ResolverSet {
    resolvers: HashMap<ResolverKind, Arc<dyn Resolver>>,
}

impl fmt::Debug for ResolverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.resolvers.keys().collect();
        kinds.sort();
        f.debug_struct("ResolverSet").field("kinds", &kinds).finish()
    }
}

impl ResolverSet {
    /// Fresh resolvers reading from `paths`, running tools through `tools`.
    pub fn new(paths: &HostPaths, tools: Arc<dyn ToolExecutor>) -> Self {
        let resolvers: [Arc<dyn Resolver>; 5] = [
            Arc::new(DmiResolver::new(paths.dmi_root.clone())),
            Arc::new(DebianVersionResolver::new(paths.debian_version.clone())),
            Arc::new(OsReleaseResolver::new(paths.os_release.clone())),
            Arc::new(MemoryResolver::new(paths.meminfo.clone())),
            Arc::new(PartitionResolver::new(paths.block_root.clone(), tools)),
        ];
        Self::from_resolvers(resolvers)
    }

    /// The process-wide resolvers.
    pub fn system() -> Self {
        let resolvers: [Arc<dyn Resolver>; 5] = [
            DmiResolver::global(),
            DebianVersionResolver::global(),
            OsReleaseResolver::global(),
            MemoryResolver::global(),
            PartitionResolver::global(),
        ];
        Self::from_resolvers(resolvers)
    }

    fn from_resolvers(resolvers: impl IntoIterator<Item = Arc<dyn Resolver>>) -> Self {
        Self {
            resolvers: resolvers.into_iter().map(|r| (r.kind(), r)).collect(),
        }
    }

    /// Replace one resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.insert(resolver.kind(), resolver);
        self
    }

    /// The resolver of a kind.
    pub fn get(&self, kind: ResolverKind) -> Option<&Arc<dyn Resolver>> {
        self.resolvers.get(&kind)
    }
}
