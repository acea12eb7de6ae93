//! Build configuration threaded through planning, execution and
//! verification.
//!
//! Everything the build would otherwise read from ambient process state
//! (install prefix, compiler path, tool prefix, parallelism, timeouts) is
//! collected here once and then only borrowed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::recipe::Recipe;
use crate::util::config::Config;
use crate::util::template::Vars;

/// Default timeout for a single build step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// Default timeout for a single variant or check invocation.
pub const DEFAULT_VARIANT_TIMEOUT: Duration = Duration::from_secs(60);

/// Immutable build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Installation prefix
    pub prefix: PathBuf,

    /// Unpacked source tree; build steps run here
    pub source_dir: PathBuf,

    /// C compiler passed to configure
    pub cc: PathBuf,

    /// Root of the surrounding package installation, for cross-package
    /// paths such as `{tool_prefix}/sbin/...`
    pub tool_prefix: PathBuf,

    /// Parallel jobs for the build step
    pub jobs: usize,

    /// Parallel variant checks
    pub verify_jobs: usize,

    pub step_timeout: Duration,
    pub variant_timeout: Duration,

    /// Building from the development head rather than a release
    pub head: bool,
}

impl BuildConfig {
    /// Create a configuration with defaults for everything but the prefix.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        let jobs = default_jobs();
        BuildConfig {
            prefix: prefix.into(),
            source_dir: PathBuf::from("."),
            cc: PathBuf::from("cc"),
            tool_prefix: PathBuf::from("/usr/local"),
            jobs,
            verify_jobs: jobs,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            variant_timeout: DEFAULT_VARIANT_TIMEOUT,
            head: false,
        }
    }

    /// Apply values from a loaded config file.
    pub fn with_config(mut self, config: &Config) -> Self {
        if let Some(jobs) = config.build.jobs {
            self.jobs = jobs.max(1);
        }
        if let Some(secs) = config.build.step_timeout_secs {
            self.step_timeout = Duration::from_secs(secs);
        }
        if let Some(ref tool_prefix) = config.build.tool_prefix {
            self.tool_prefix = tool_prefix.clone();
        }
        if let Some(ref cc) = config.build.cc {
            self.cc = cc.clone();
        }
        if let Some(jobs) = config.verify.jobs {
            self.verify_jobs = jobs.max(1);
        }
        if let Some(secs) = config.verify.variant_timeout_secs {
            self.variant_timeout = Duration::from_secs(secs);
        }
        self
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn with_cc(mut self, cc: impl Into<PathBuf>) -> Self {
        self.cc = cc.into();
        self
    }

    pub fn with_tool_prefix(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tool_prefix = dir.into();
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_verify_jobs(mut self, jobs: usize) -> Self {
        self.verify_jobs = jobs.max(1);
        self
    }

    pub fn with_head(mut self, head: bool) -> Self {
        self.head = head;
        self
    }

    /// Directory holding the installed executables.
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Placeholder values for build-time templates.
    pub fn vars(&self, recipe: &Recipe) -> Vars {
        let mut vars = Vars::new();
        vars.insert("prefix", display(&self.prefix));
        vars.insert("bin", display(&self.bin_dir()));
        vars.insert("cc", display(&self.cc));
        vars.insert("tool_prefix", display(&self.tool_prefix));
        vars.insert("version", recipe.package.version.clone());
        vars.insert("jobs", self.jobs.to_string());
        vars
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
