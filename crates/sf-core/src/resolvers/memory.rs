//! System memory and swap from `/proc/meminfo`.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Resolver, ResolverKind};
use crate::memo::FactMemo;

/// Default meminfo path.
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// Memory totals in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInfo {
    pub total: Option<u64>,
    pub available: Option<u64>,
    pub swap_total: Option<u64>,
    pub swap_free: Option<u64>,
}

/// Parse meminfo content (for testing).
///
/// Values are reported in kB and converted to bytes. `MemAvailable` falls back
/// to `MemFree` on kernels that lack it.
pub fn parse_meminfo_content(content: &str) -> MemInfo {
    let mut info = MemInfo::default();
    let mut free = None;

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = rest.split_whitespace().next().and_then(|s| s.parse::<u64>().ok()) else {
            continue;
        };
        let bytes = Some(kb.saturating_mul(1024));

        match key.trim() {
            "MemTotal" => info.total = bytes,
            "MemAvailable" => info.available = bytes,
            "MemFree" => free = bytes,
            "SwapTotal" => info.swap_total = bytes,
            "SwapFree" => info.swap_free = bytes,
            _ => {}
        }
    }

    if info.available.is_none() {
        info.available = free;
    }
    info
}

/// Resolver for `/proc/meminfo`. One read answers `total`, `available`,
/// `swap_total` and `swap_free`.
#[derive(Debug)]
pub struct MemoryResolver {
    path: PathBuf,
    memo: FactMemo,
}

static GLOBAL: OnceLock<Arc<MemoryResolver>> = OnceLock::new();

impl MemoryResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            memo: FactMemo::new(),
        }
    }

    /// The process-wide instance over `/proc/meminfo`.
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::new(MEMINFO_PATH)))
            .clone()
    }
}

impl Resolver for MemoryResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Memory
    }

    fn resolve(&self, fact: &str) -> Option<Value> {
        self.memo.fetch_or_resolve(fact, |entries| {
            let Ok(content) = fs::read_to_string(&self.path) else {
                return;
            };
            let info = parse_meminfo_content(&content);
            entries.insert("total", info.total.map(Value::from));
            entries.insert("available", info.available.map(Value::from));
            entries.insert("swap_total", info.swap_total.map(Value::from));
            entries.insert("swap_free", info.swap_free.map(Value::from));
        })
    }
}
