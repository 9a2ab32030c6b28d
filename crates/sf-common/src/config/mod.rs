//! Configuration loading and validation for sysfacts.
//!
//! This module provides:
//! - The cache group index ([`CacheGroups`], [`GroupIndex`])
//! - The `sysfacts.json` file format (cache directory, TTLs, extra groups)
//! - Deterministic config resolution (CLI > env > XDG > /etc > defaults)

pub mod groups;
pub mod resolve;

pub use groups::{CacheGroups, GroupIndex, BUILTIN_GROUPS};
pub use resolve::{ConfigPaths, ConfigResolver};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "sysfacts.json";

/// The complete loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache group index with configured TTLs.
    pub groups: CacheGroups,
    /// Directory holding one file per cache group.
    pub cache_dir: PathBuf,
    /// Metadata about how this config was loaded.
    pub source: ConfigSource,
}

/// On-disk shape of `sysfacts.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Cache directory override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Group name → TTL string (`"1d"`, `"30min"`).
    #[serde(default)]
    pub ttls: BTreeMap<String, String>,

    /// Additional groups: group name → member facts.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

impl ConfigFile {
    /// Parse `sysfacts.json` content.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config: {}", e)))
    }

    /// Build the group index: built-in groups, then extra groups, then TTLs.
    pub fn build_groups(&self) -> Result<CacheGroups> {
        let mut groups = CacheGroups::builtin();
        for (name, facts) in &self.groups {
            groups.add_group(name, facts.iter().cloned())?;
        }
        for (group, ttl) in &self.ttls {
            let ttl = humantime::parse_duration(ttl).map_err(|e| {
                Error::InvalidConfig(format!("invalid ttl for cache group {}: {}", group, e))
            })?;
            groups.set_ttl(group, ttl)?;
        }
        Ok(groups)
    }
}

/// Configuration source for the config file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file, or None if using defaults
    pub path: Option<String>,
    /// SHA-256 hash of file contents, or None if defaults
    pub hash: Option<String>,
    /// How this source was resolved
    pub resolution: ConfigResolution,
}

impl ConfigSource {
    /// Source for built-in defaults.
    pub fn defaults() -> Self {
        ConfigSource {
            path: None,
            hash: None,
            resolution: ConfigResolution::Default,
        }
    }
}

/// How a configuration path was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigResolution {
    /// Explicitly provided via CLI flag
    CliFlag,
    /// Set via environment variable
    EnvVar,
    /// Found in XDG config directory
    XdgConfig,
    /// Found in /etc/sysfacts
    SystemConfig,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::CliFlag => write!(f, "CLI flag"),
            ConfigResolution::EnvVar => write!(f, "environment variable"),
            ConfigResolution::XdgConfig => write!(f, "XDG config"),
            ConfigResolution::SystemConfig => write!(f, "system config"),
            ConfigResolution::Default => write!(f, "builtin default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_full_config() {
        let file = ConfigFile::parse(
            r#"{
                "cache_dir": "/tmp/facts",
                "ttls": { "partitions": "1d", "operating system": "30min" },
                "groups": { "site": ["custom.rack"] }
            }"#,
        )
        .unwrap();
        assert_eq!(file.cache_dir, Some(PathBuf::from("/tmp/facts")));

        let groups = file.build_groups().unwrap();
        assert_eq!(
            groups.group_ttl("partitions"),
            Some(Duration::from_secs(86_400))
        );
        assert_eq!(
            groups.group_ttl("operating system"),
            Some(Duration::from_secs(1_800))
        );
        assert_eq!(groups.fact_group("custom.rack"), Some("site"));
        assert_eq!(groups.group_ttl("site"), None);
    }

    #[test]
    fn test_ttl_for_user_group() {
        let file = ConfigFile::parse(
            r#"{ "groups": { "site": ["custom.rack"] }, "ttls": { "site": "2h" } }"#,
        )
        .unwrap();
        let groups = file.build_groups().unwrap();
        assert_eq!(groups.group_ttl("site"), Some(Duration::from_secs(7_200)));
    }

    #[test]
    fn test_empty_config_is_valid() {
        let file = ConfigFile::parse("{}").unwrap();
        let groups = file.build_groups().unwrap();
        assert!(!groups.has_ttls());
    }

    #[test]
    fn test_invalid_ttl() {
        let file = ConfigFile::parse(r#"{ "ttls": { "partitions": "soon" } }"#).unwrap();
        let err = file.build_groups().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("partitions"));
    }

    #[test]
    fn test_unknown_ttl_group() {
        let file = ConfigFile::parse(r#"{ "ttls": { "disks": "1d" } }"#).unwrap();
        assert!(file.build_groups().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ConfigFile::parse(r#"{ "ttl": {} }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(ConfigResolution::CliFlag.to_string(), "CLI flag");
        assert_eq!(ConfigResolution::Default.to_string(), "builtin default");
    }
}
