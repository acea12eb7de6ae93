//! Public types for the verification phase.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::core::error::RecipeError;
use crate::core::recipe::CheckKind;
use crate::util::process::ProcessBuilder;
use crate::util::serialize_duration_ms;

/// Output format for run and verification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
    /// GitHub Actions annotations with job summary
    Github,
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "github" | "github-actions" | "gha" => Ok(OutputFormat::Github),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

/// Error parsing output format option.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid output format '{0}', valid values: human, json, github")]
pub struct OutputFormatParseError(pub String);

/// Where the package under test was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallArtifacts {
    pub prefix: PathBuf,
    pub bin_dir: PathBuf,
}

impl InstallArtifacts {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        let bin_dir = prefix.join("bin");
        InstallArtifacts { prefix, bin_dir }
    }
}

/// How a variant's output is judged.
#[derive(Debug, Clone)]
pub enum Matcher {
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    pub fn is_match(&self, output: &str) -> bool {
        match self {
            Matcher::Substring(s) => output.contains(s.as_str()),
            Matcher::Regex(re) => re.is_match(output),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Matcher::Substring(s) => format!("`{}`", s),
            Matcher::Regex(re) => format!("/{}/", re.as_str()),
        }
    }
}

/// One row of the variant table, ready to run.
#[derive(Debug, Clone)]
pub struct TestVariant {
    pub id: String,
    pub command: ProcessBuilder,
    pub matcher: Matcher,
}

/// Result of running one variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantOutcome {
    pub id: String,
    pub passed: bool,
    pub command: String,
    pub output: String,
    pub status: Option<i32>,
    pub timed_out: bool,
    /// Why the variant failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

impl VariantOutcome {
    pub fn to_error(&self) -> Option<RecipeError> {
        let message = self.message.as_ref()?;
        Some(RecipeError::VariantCheckFailure {
            variant: self.id.clone(),
            message: message.clone(),
            output: self.output.clone(),
        })
    }
}

/// Result of one global check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub kind: CheckKind,
    pub passed: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

impl CheckOutcome {
    pub fn fail(name: &str, kind: CheckKind, message: impl Into<String>) -> Self {
        CheckOutcome {
            name: name.to_string(),
            kind,
            passed: false,
            output: String::new(),
            message: Some(message.into()),
            duration: Duration::ZERO,
        }
    }

    pub fn to_error(&self) -> Option<RecipeError> {
        let message = self.message.as_ref()?;
        Some(RecipeError::IntegrityCheckFailure {
            check: self.name.clone(),
            message: message.clone(),
            output: self.output.clone(),
        })
    }
}

/// Everything the verification phase found.
///
/// Filled in completely before [`VerificationReport::passed`] is consulted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// Outcomes keyed by variant id
    pub variants: BTreeMap<String, VariantOutcome>,

    /// Global checks, in declaration order
    pub checks: Vec<CheckOutcome>,

    /// Checks skipped because their platform condition did not hold
    pub skipped: Vec<String>,

    /// Resources that could not be staged
    #[serde(serialize_with = "serialize_errors")]
    pub staging_errors: Vec<RecipeError>,

    /// Scratch workspace used for resources; already removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
}

fn serialize_errors<S>(errors: &[RecipeError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

impl VerificationReport {
    /// All variants and checks passed and every resource was staged.
    pub fn passed(&self) -> bool {
        self.variants.values().all(|v| v.passed)
            && self.checks.iter().all(|c| c.passed)
            && self.staging_errors.is_empty()
    }

    pub fn total(&self) -> usize {
        self.variants.len()
    }

    pub fn passed_count(&self) -> usize {
        self.variants.values().filter(|v| v.passed).count()
    }

    /// Ids of failing variants, sorted.
    pub fn failing(&self) -> Vec<&str> {
        self.variants
            .values()
            .filter(|v| !v.passed)
            .map(|v| v.id.as_str())
            .collect()
    }

    /// Every failure as a typed error.
    pub fn errors(&self) -> Vec<RecipeError> {
        self.staging_errors
            .iter()
            .cloned()
            .chain(self.variants.values().filter_map(VariantOutcome::to_error))
            .chain(self.checks.iter().filter_map(CheckOutcome::to_error))
            .collect()
    }
}
