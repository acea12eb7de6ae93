//! Host platform and toolchain identity.
//!
//! A [`PlatformContext`] is the runtime input every recipe condition is
//! evaluated against. It is built once per run, either detected from the
//! host or given explicitly on the command line, and never changes after.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::process::{CommandRunner, ProcessBuilder};

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    /// Apple macOS
    Macos,
    /// Linux
    Linux,
    /// Anything else (BSDs, Windows, ...)
    Other,
}

impl HostOs {
    /// Every OS family, in declaration order.
    pub const ALL: [HostOs; 3] = [HostOs::Macos, HostOs::Linux, HostOs::Other];

    /// The OS family this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            HostOs::Macos
        } else if cfg!(target_os = "linux") {
            HostOs::Linux
        } else {
            HostOs::Other
        }
    }

    /// Get the OS family name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Macos => "macos",
            HostOs::Linux => "linux",
            HostOs::Other => "other",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HostOs {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "mac" | "darwin" | "osx" => Ok(HostOs::Macos),
            "linux" => Ok(HostOs::Linux),
            "other" => Ok(HostOs::Other),
            _ => Err(PlatformParseError::Os(s.to_string())),
        }
    }
}

/// Compiler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerFamily {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Microsoft Visual C++
    Msvc,
}

impl CompilerFamily {
    /// Get the family name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerFamily::Gcc => "gcc",
            CompilerFamily::Clang => "clang",
            CompilerFamily::AppleClang => "apple-clang",
            CompilerFamily::Msvc => "msvc",
        }
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompilerFamily {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gcc" | "gnu" => Ok(CompilerFamily::Gcc),
            "clang" | "llvm" => Ok(CompilerFamily::Clang),
            "apple-clang" | "appleclang" => Ok(CompilerFamily::AppleClang),
            "msvc" | "cl" => Ok(CompilerFamily::Msvc),
            _ => Err(PlatformParseError::Compiler(s.to_string())),
        }
    }
}

/// A compiler identity: family plus a dotted version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompilerId {
    pub family: CompilerFamily,
    pub version: String,
}

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid regex"));

impl CompilerId {
    pub fn new(family: CompilerFamily, version: impl Into<String>) -> Self {
        CompilerId {
            family,
            version: version.into(),
        }
    }

    /// Major version component, if the version string starts with digits.
    pub fn major(&self) -> Option<u64> {
        major_of(&self.version)
    }

    /// Whether this compiler matches a family and an optional version
    /// prefix. Versions compare component-wise, so `"5"` matches `5.4.0`
    /// but not `15.1`.
    pub fn matches(&self, family: CompilerFamily, version: Option<&str>) -> bool {
        if self.family != family {
            return false;
        }
        match version {
            None => true,
            Some(wanted) => {
                let ours: Vec<&str> = self.version.split('.').collect();
                let theirs: Vec<&str> = wanted.split('.').collect();
                theirs.len() <= ours.len() && ours.iter().zip(&theirs).all(|(a, b)| a == b)
            }
        }
    }

    /// Detect the compiler identity by running `<cc> --version`.
    pub fn detect(cc: &Path, runner: &dyn CommandRunner) -> anyhow::Result<Self> {
        let output = runner.run(&ProcessBuilder::new(cc).arg("--version"), None)?;
        if !output.success() {
            anyhow::bail!(
                "`{} --version` exited with {:?}",
                cc.display(),
                output.status
            );
        }
        Self::parse_version_output(&output.combined())
            .ok_or_else(|| anyhow::anyhow!("unrecognised compiler: {}", cc.display()))
    }

    /// Parse the banner printed by `cc --version`.
    pub fn parse_version_output(banner: &str) -> Option<Self> {
        let first = banner.lines().next()?.to_lowercase();
        let family = if first.contains("apple") && first.contains("clang") {
            CompilerFamily::AppleClang
        } else if first.contains("clang") {
            CompilerFamily::Clang
        } else if first.contains("gcc")
            || first.contains("g++")
            || banner.contains("Free Software Foundation")
        {
            CompilerFamily::Gcc
        } else if first.contains("microsoft") {
            CompilerFamily::Msvc
        } else {
            return None;
        };

        // GCC prints its version last on the first line; the package
        // version in parentheses may also contain digits.
        let version = if family == CompilerFamily::Gcc {
            VERSION_RE.find_iter(&first).last()
        } else {
            VERSION_RE.find(&first)
        }?;

        Some(CompilerId::new(family, version.as_str()))
    }
}

impl fmt::Display for CompilerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.family, self.version)
    }
}

impl std::str::FromStr for CompilerId {
    type Err = PlatformParseError;

    /// Parse `gcc@13.2`, `clang-17` or a bare family name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, version) = match s.split_once('@') {
            Some((f, v)) => (f, v),
            None => match s.rsplit_once('-') {
                Some((f, v)) if v.chars().next().is_some_and(|c| c.is_ascii_digit()) => (f, v),
                _ => (s, ""),
            },
        };

        let family: CompilerFamily = family.parse()?;
        if !version.is_empty() && major_of(version).is_none() {
            return Err(PlatformParseError::Compiler(s.to_string()));
        }
        Ok(CompilerId::new(family, version))
    }
}

fn major_of(version: &str) -> Option<u64> {
    version.split('.').next()?.parse().ok()
}

/// Everything a platform condition may look at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformContext {
    pub os: HostOs,
    pub compiler: CompilerId,
}

impl PlatformContext {
    pub fn new(os: HostOs, compiler: CompilerId) -> Self {
        PlatformContext { os, compiler }
    }

    /// Detect the build host: OS from the compile target, compiler by
    /// running `cc`.
    pub fn detect(cc: &Path, runner: &dyn CommandRunner) -> anyhow::Result<Self> {
        let compiler = CompilerId::detect(cc, runner)?;
        tracing::debug!("detected compiler {}", compiler);
        Ok(PlatformContext::new(HostOs::current(), compiler))
    }
}

impl fmt::Display for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.os, self.compiler)
    }
}

/// Error parsing a platform or compiler name.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformParseError {
    #[error("invalid host OS '{0}', valid values: macos, linux, other")]
    Os(String),
    #[error("invalid compiler '{0}', expected <family>[@<version>] with family one of: gcc, clang, apple-clang, msvc")]
    Compiler(String),
}
