//! Operating-system release files: `/etc/debian_version` and `/etc/os-release`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use super::{Resolver, ResolverKind};
use crate::collect::read_trimmed;
use crate::memo::FactMemo;

/// Default Debian version file.
pub const DEBIAN_VERSION_PATH: &str = "/etc/debian_version";

/// Default os-release file.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// os-release fields exposed as facts, as `(file key, fact key)`.
const OS_RELEASE_FIELDS: &[(&str, &str)] = &[
    ("ID", "id"),
    ("NAME", "name"),
    ("VERSION_ID", "version_id"),
    ("PRETTY_NAME", "pretty_name"),
    ("VERSION_CODENAME", "version_codename"),
];

/// Resolver for `/etc/debian_version`; answers `version`.
#[derive(Debug)]
pub struct DebianVersionResolver {
    path: PathBuf,
    memo: FactMemo,
}

static DEBIAN_GLOBAL: OnceLock<Arc<DebianVersionResolver>> = OnceLock::new();

impl DebianVersionResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            memo: FactMemo::new(),
        }
    }

    /// The process-wide instance over `/etc/debian_version`.
    pub fn global() -> Arc<Self> {
        DEBIAN_GLOBAL
            .get_or_init(|| Arc::new(Self::new(DEBIAN_VERSION_PATH)))
            .clone()
    }
}

impl Resolver for DebianVersionResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::DebianVersion
    }

    fn resolve(&self, fact: &str) -> Option<Value> {
        self.memo.fetch_or_resolve(fact, |entries| {
            if let Some(version) = read_trimmed(&self.path) {
                entries.insert("version", Some(Value::String(version)));
            }
        })
    }
}

/// Parse os-release content into `KEY → value`, unquoting values.
pub fn parse_os_release_content(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Resolver for `/etc/os-release`. One read answers every field.
#[derive(Debug)]
pub struct OsReleaseResolver {
    path: PathBuf,
    memo: FactMemo,
}

static OS_RELEASE_GLOBAL: OnceLock<Arc<OsReleaseResolver>> = OnceLock::new();

impl OsReleaseResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            memo: FactMemo::new(),
        }
    }

    /// The process-wide instance over `/etc/os-release`.
    pub fn global() -> Arc<Self> {
        OS_RELEASE_GLOBAL
            .get_or_init(|| Arc::new(Self::new(OS_RELEASE_PATH)))
            .clone()
    }
}

impl Resolver for OsReleaseResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::OsRelease
    }

    fn resolve(&self, fact: &str) -> Option<Value> {
        self.memo.fetch_or_resolve(fact, |entries| {
            let Ok(content) = fs::read_to_string(&self.path) else {
                return;
            };
            let fields = parse_os_release_content(&content);
            for (file_key, fact_key) in OS_RELEASE_FIELDS {
                let value = fields
                    .get(*file_key)
                    .filter(|v| !v.is_empty())
                    .map(|v| Value::String(v.clone()));
                entries.insert(*fact_key, value);
            }
        })
    }
}
