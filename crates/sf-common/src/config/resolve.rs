//! Configuration resolution for sysfacts.
//!
//! Implements deterministic config resolution order:
//! 1. Explicit CLI flags (--config, --cache-dir)
//! 2. Environment variables (SYSFACTS_CONFIG, SYSFACTS_CACHE_DIR)
//! 3. XDG default (~/.config/sysfacts/sysfacts.json)
//! 4. System config (/etc/sysfacts/sysfacts.json)
//! 5. Built-in defaults

use std::env;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Config, ConfigFile, ConfigResolution, ConfigSource, CONFIG_FILENAME};
use crate::error::{Error, Result};

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "SYSFACTS_CONFIG";

/// Environment variable naming the cache directory.
pub const ENV_CACHE_DIR: &str = "SYSFACTS_CACHE_DIR";

/// Application name for XDG and system directories.
const APP_NAME: &str = "sysfacts";

/// Cache directory used when nothing else is configured and no user cache
/// directory is known.
const SYSTEM_CACHE_DIR: &str = "/var/cache/sysfacts/cached_facts";

/// Paths given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit path to sysfacts.json
    pub config_path: Option<PathBuf>,
    /// Explicit cache directory
    pub cache_dir: Option<PathBuf>,
}

/// Configuration resolver with deterministic resolution order.
#[derive(Debug)]
pub struct ConfigResolver {
    /// Paths from CLI flags
    cli_paths: ConfigPaths,
}

impl ConfigResolver {
    /// Create a new resolver with CLI paths.
    pub fn new(paths: ConfigPaths) -> Self {
        ConfigResolver { cli_paths: paths }
    }

    /// Create a resolver with no CLI overrides.
    pub fn with_defaults() -> Self {
        ConfigResolver {
            cli_paths: ConfigPaths::default(),
        }
    }

    /// Resolve the sysfacts.json path.
    pub fn resolve_config_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        // 1. CLI flag
        if let Some(ref path) = self.cli_paths.config_path {
            return (Some(path.clone()), ConfigResolution::CliFlag);
        }

        // 2. SYSFACTS_CONFIG env var
        if let Ok(path) = env::var(ENV_CONFIG_PATH) {
            return (Some(PathBuf::from(path)), ConfigResolution::EnvVar);
        }

        // 3. XDG config dir
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join(APP_NAME).join(CONFIG_FILENAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 4. System config
        let system_path = PathBuf::from("/etc").join(APP_NAME).join(CONFIG_FILENAME);
        if system_path.exists() {
            return (Some(system_path), ConfigResolution::SystemConfig);
        }

        // 5. Default
        (None, ConfigResolution::Default)
    }

    /// Resolve the cache directory, given the value from the config file.
    pub fn resolve_cache_dir(&self, from_file: Option<PathBuf>) -> PathBuf {
        if let Some(ref dir) = self.cli_paths.cache_dir {
            return dir.clone();
        }

        if let Ok(dir) = env::var(ENV_CACHE_DIR) {
            return PathBuf::from(dir);
        }

        if let Some(dir) = from_file {
            return dir;
        }

        default_cache_dir()
    }

    /// Load configuration from the resolved path or defaults.
    ///
    /// An explicitly named config file (CLI or env) that cannot be read is an
    /// error; discovered files are only used when they exist.
    pub fn load(&self) -> Result<Config> {
        let (path, resolution) = self.resolve_config_path();

        let (file, source) = match path {
            Some(p) => {
                let content = fs::read_to_string(&p).map_err(|e| {
                    Error::Config(format!("failed to read config from {}: {}", p.display(), e))
                })?;

                let hash = compute_sha256(&content);
                let file = ConfigFile::parse(&content).map_err(|e| {
                    Error::InvalidConfig(format!("{}: {}", p.display(), e))
                })?;

                (
                    file,
                    ConfigSource {
                        path: Some(p.to_string_lossy().to_string()),
                        hash: Some(hash),
                        resolution,
                    },
                )
            }
            None => (ConfigFile::default(), ConfigSource::defaults()),
        };

        let groups = file.build_groups()?;
        let cache_dir = self.resolve_cache_dir(file.cache_dir.clone());

        debug!(
            source = %source.resolution,
            path = ?source.path,
            cache_dir = %cache_dir.display(),
            "configuration loaded"
        );

        Ok(Config {
            groups,
            cache_dir,
            source,
        })
    }
}

/// Default cache directory: the user cache dir, else a system path.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join(APP_NAME).join("cached_facts"))
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CACHE_DIR))
}

/// Compute SHA-256 hash of a string.
fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}
