//! Post-install verification.
//!
//! ## Usage
//!
//! ```bash
//! slipway verify recipes/qemu.toml --prefix /opt/qemu
//! slipway verify recipes/qemu.toml --prefix /opt/qemu --output-format github
//! ```
//!
//! ## Phases
//!
//! 1. Run every variant of the recipe's variant table, in parallel
//! 2. Stage test resources into a scratch workspace
//! 3. Run the global checks that apply to the host platform
//! 4. Remove the workspace
//!
//! ## Output Formats
//!
//! - `human`: Default human-readable output
//! - `json`: Machine-readable JSON output
//! - `github`: GitHub Actions annotations with job summary

mod format;
mod harness;
mod stage;
mod types;

pub use self::format::{format_report, format_report_for_output, format_report_json};
pub use self::harness::{test_variants, VariantHarness};
pub use self::stage::{extract_tar_gz, Fetcher, HttpFetcher, ResourceStager, StagedPath};
pub use self::types::{
    CheckOutcome, InstallArtifacts, Matcher, OutputFormat, OutputFormatParseError, TestVariant,
    VariantOutcome, VerificationReport,
};
