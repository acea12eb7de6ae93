//! Configuration file support.
//!
//! Two locations are read:
//! - Global: `~/.slipway/config.toml` - User-wide defaults
//! - Project: `.slipway/config.toml` - Overrides for the current directory
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Slipway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildSettings,

    /// Verification settings
    pub verify: VerifySettings,

    /// Network settings
    pub net: NetConfig,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Parallel jobs passed to the build step (None = auto-detect)
    pub jobs: Option<usize>,

    /// Kill a build step after this many seconds
    pub step_timeout_secs: Option<u64>,

    /// Root of the surrounding package installation
    pub tool_prefix: Option<PathBuf>,

    /// C compiler to configure with
    pub cc: Option<PathBuf>,
}

/// `[verify]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    /// Variants checked concurrently (None = auto-detect)
    pub jobs: Option<usize>,

    /// Kill a variant or check after this many seconds
    pub variant_timeout_secs: Option<u64>,
}

/// `[net]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Download timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Offline mode (only `file://` resources)
    pub offline: Option<bool>,
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
    pub fn merge(&mut self, other: Config) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.build.jobs, other.build.jobs);
        take(&mut self.build.step_timeout_secs, other.build.step_timeout_secs);
        take(&mut self.build.tool_prefix, other.build.tool_prefix);
        take(&mut self.build.cc, other.build.cc);

        take(&mut self.verify.jobs, other.verify.jobs);
        take(&mut self.verify.variant_timeout_secs, other.verify.variant_timeout_secs);

        take(&mut self.net.timeout_secs, other.net.timeout_secs);
        take(&mut self.net.offline, other.net.offline);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.slipway/config.toml)
/// 2. Global config (~/.slipway/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global slipway config directory (~/.slipway).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".slipway"))
}

/// Get the global config path (~/.slipway/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.slipway/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".slipway").join("config.toml")
}
