//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `~/.mdns-recipe/config.toml` - User-wide defaults
//! - Project: `.mdns-recipe/config.toml` - Overrides for the working directory
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Recipe configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool overrides
    pub tools: ToolsConfig,

    /// Source download settings
    pub fetch: FetchConfig,
}

/// Paths (or names) of the external tools the backends invoke.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// make, used by the POSIX backend
    pub make: Option<PathBuf>,

    /// msbuild, used by the Windows backend
    pub msbuild: Option<PathBuf>,

    /// git, used to apply patches
    pub git: Option<PathBuf>,
}

/// Fetch-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Offline mode (fail instead of downloading)
    pub offline: bool,

    /// Refuse registry entries without a sha256
    pub require_checksum: bool,

    /// Reuse verified downloads from the cache directory
    #[serde(default = "default_true")]
    pub cache: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            offline: false,
            require_checksum: false,
            cache: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// A file only overrides what it sets, so the raw TOML is consulted for
    /// booleans whose default would otherwise be indistinguishable.
    pub fn merge(&mut self, other: Config, raw: &toml::Table) {
        if other.tools.make.is_some() {
            self.tools.make = other.tools.make;
        }
        if other.tools.msbuild.is_some() {
            self.tools.msbuild = other.tools.msbuild;
        }
        if other.tools.git.is_some() {
            self.tools.git = other.tools.git;
        }

        let fetch = raw.get("fetch").and_then(|f| f.as_table());
        let sets = |key: &str| fetch.is_some_and(|f| f.contains_key(key));
        if sets("offline") {
            self.fetch.offline = other.fetch.offline;
        }
        if sets("require_checksum") {
            self.fetch.require_checksum = other.fetch.require_checksum;
        }
        if sets("cache") {
            self.fetch.cache = other.fetch.cache;
        }
    }
}

fn merge_file(config: &mut Config, path: &Path) {
    if !path.exists() {
        return;
    }
    let raw = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| toml::from_str::<toml::Table>(&s).ok())
        .unwrap_or_default();
    let loaded = Config::load_or_default(path);
    config.merge(loaded, &raw);
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.mdns-recipe/config.toml)
/// 2. Global config (~/.mdns-recipe/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global) = global_path {
        merge_file(&mut config, global);
    }
    merge_file(&mut config, project_path);

    config
}

/// Get the global config directory (~/.mdns-recipe).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".mdns-recipe"))
}

/// Get the global config path (~/.mdns-recipe/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.mdns-recipe/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".mdns-recipe").join("config.toml")
}
