//! Global context for slipway commands.
//!
//! Resolves the working directory and the merged configuration once, so
//! commands never read ambient process state themselves.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{global_config_path, load_config, project_config_path, Config};

/// Paths and configuration shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    cwd: PathBuf,
    config: Config,
}

impl GlobalContext {
    /// Build a context for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Build a context rooted at `cwd`, reading `~/.slipway/config.toml`
    /// and `<cwd>/.slipway/config.toml`.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let global = global_config_path();
        let config = load_config(global.as_deref(), &project_config_path(&cwd));
        tracing::debug!("loaded config: {:?}", config);
        GlobalContext { cwd, config }
    }

    /// Build a context with an explicit configuration.
    pub fn with_config(cwd: PathBuf, config: Config) -> Self {
        GlobalContext { cwd, config }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a path given on the command line against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}
