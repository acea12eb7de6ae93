//! Variant matrix and global check execution.
//!
//! Every variant is run, whatever happens to the others. Outcomes land in
//! a map keyed by variant id, so the report does not depend on the order
//! the thread pool finishes them in.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use regex::Regex;
use tempfile::TempDir;

use super::stage::{Fetcher, ResourceStager, StagedPath};
use super::types::{
    CheckOutcome, InstallArtifacts, Matcher, TestVariant, VariantOutcome, VerificationReport,
};
use crate::builder::context::BuildConfig;
use crate::core::error::RecipeError;
use crate::core::platform::PlatformContext;
use crate::core::recipe::{CheckSpec, Recipe};
use crate::util::process::{CommandRunner, ProcessBuilder};
use crate::util::template::{self, Vars};

/// Runs the variant matrix and the global checks of a recipe.
pub struct VariantHarness<'a> {
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
    jobs: usize,
    timeout: Option<Duration>,
    progress: bool,
}

impl<'a> VariantHarness<'a> {
    pub fn new(runner: &'a dyn CommandRunner, fetcher: &'a dyn Fetcher) -> Self {
        VariantHarness {
            runner,
            fetcher,
            jobs: 1,
            timeout: None,
            progress: false,
        }
    }

    /// Take parallelism and per-invocation timeout from a build config.
    pub fn with_config(self, config: &BuildConfig) -> Self {
        self.jobs(config.verify_jobs).timeout(config.variant_timeout)
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Show a progress bar while variants run.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Verify an installation of `recipe`.
    ///
    /// Variant and check failures are recorded in the report. An `Err`
    /// means verification could not start at all.
    pub fn verify(
        &self,
        recipe: &Recipe,
        ctx: &PlatformContext,
        config: &BuildConfig,
        install: &InstallArtifacts,
    ) -> Result<VerificationReport> {
        let start = Instant::now();
        let vars = install_vars(recipe, config, install);
        let variants = test_variants(recipe, &vars, config.head)?;

        tracing::info!(
            "Verifying {} variant(s) of {} with {} job(s)",
            variants.len(),
            recipe.package.name,
            self.jobs
        );

        let mut report = VerificationReport {
            variants: self.run_variants(&variants)?,
            ..Default::default()
        };

        self.run_checks(recipe, ctx, &vars, &mut report)?;

        report.duration = start.elapsed();
        Ok(report)
    }

    /// Run every variant, each independently of the others.
    pub fn run_variants(&self, variants: &[TestVariant]) -> Result<BTreeMap<String, VariantOutcome>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .context("failed to create variant thread pool")?;

        let pb = self.progress_bar(variants.len());

        let outcomes: Vec<VariantOutcome> = pool.install(|| {
            variants
                .par_iter()
                .map(|variant| {
                    let outcome = self.run_variant(variant);
                    if let Some(pb) = &pb {
                        pb.inc(1);
                    }
                    outcome
                })
                .collect()
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        Ok(outcomes.into_iter().map(|o| (o.id.clone(), o)).collect())
    }

    fn run_variant(&self, variant: &TestVariant) -> VariantOutcome {
        let command = variant.command.display_command();
        tracing::debug!("variant {}: {}", variant.id, command);

        let start = Instant::now();
        let (status, timed_out, output, message) = match self.runner.run(&variant.command, self.timeout) {
            Ok(out) => {
                let combined = out.combined();
                let message = if out.timed_out {
                    Some("timed out".to_string())
                } else if !out.success() {
                    Some(match out.status {
                        Some(code) => format!("exited with code {}", code),
                        None => "terminated by signal".to_string(),
                    })
                } else if !variant.matcher.is_match(&combined) {
                    Some(format!(
                        "output does not contain {}",
                        variant.matcher.describe()
                    ))
                } else {
                    None
                };
                (out.status, out.timed_out, combined, message)
            }
            Err(e) => (None, false, String::new(), Some(format!("{:#}", e))),
        };

        if let Some(message) = &message {
            tracing::warn!("variant {} failed: {}", variant.id, message);
        }

        VariantOutcome {
            id: variant.id.clone(),
            passed: message.is_none(),
            command,
            output,
            status,
            timed_out,
            message,
            duration: start.elapsed(),
        }
    }

    /// Stage resources into a fresh workspace and run the applicable
    /// global checks. The workspace is removed before returning.
    fn run_checks(
        &self,
        recipe: &Recipe,
        ctx: &PlatformContext,
        vars: &Vars,
        report: &mut VerificationReport,
    ) -> Result<()> {
        let checks: Vec<&CheckSpec> = recipe
            .test
            .checks
            .iter()
            .filter(|c| {
                let applies = c.when.eval(ctx);
                if !applies {
                    tracing::debug!("check `{}` skipped on {}", c.name, ctx);
                    report.skipped.push(c.name.clone());
                }
                applies
            })
            .collect();

        if checks.is_empty() {
            return Ok(());
        }

        let workspace = TempDir::new().context("failed to create scratch workspace")?;
        report.workspace = Some(workspace.path().to_path_buf());

        let mut vars = vars.clone();
        vars.insert("workspace", workspace.path().display().to_string());

        let mut stager = ResourceStager::new(self.fetcher, self.runner);
        if let Some(timeout) = self.timeout {
            stager = stager.timeout(timeout);
        }

        let mut staged: BTreeMap<String, Result<StagedPath, String>> = BTreeMap::new();
        for check in &checks {
            let Some(name) = &check.resource else {
                continue;
            };
            if staged.contains_key(name) {
                continue;
            }
            let result = match recipe.resource(name) {
                Some(resource) => stager.stage(resource, workspace.path()).map_err(|e| {
                    tracing::warn!("{}", e);
                    let message = e.to_string();
                    report.staging_errors.push(e);
                    message
                }),
                None => Err(format!("unknown resource `{}`", name)),
            };
            staged.insert(name.clone(), result);
        }

        for check in checks {
            let cwd = match &check.resource {
                Some(name) => match &staged[name] {
                    Ok(path) => path.dir.clone(),
                    Err(message) => {
                        report
                            .checks
                            .push(CheckOutcome::fail(&check.name, check.kind, message.clone()));
                        continue;
                    }
                },
                None => workspace.path().to_path_buf(),
            };
            report.checks.push(self.run_check(check, &vars, &cwd));
        }

        // Dropping the TempDir removes it; closing surfaces removal errors.
        workspace
            .close()
            .context("failed to remove scratch workspace")?;
        Ok(())
    }

    fn run_check(&self, check: &CheckSpec, vars: &Vars, cwd: &Path) -> CheckOutcome {
        let start = Instant::now();
        let (program, args, expect) = match expand_check(check, vars) {
            Ok(parts) => parts,
            Err(e) => return CheckOutcome::fail(&check.name, check.kind, e.to_string()),
        };

        let cmd = ProcessBuilder::new(program).args(&args).cwd(cwd);
        tracing::debug!("check {}: {}", check.name, cmd.display_command());

        let (output, message) = match self.runner.run(&cmd, self.timeout) {
            Ok(out) => {
                let combined = out.combined();
                let missing: Vec<&String> =
                    expect.iter().filter(|e| !combined.contains(e.as_str())).collect();
                let message = if out.timed_out {
                    Some("timed out".to_string())
                } else if !out.success() {
                    Some(match out.status {
                        Some(code) => format!("exited with code {}", code),
                        None => "terminated by signal".to_string(),
                    })
                } else if !missing.is_empty() {
                    Some(format!(
                        "output is missing {}",
                        missing
                            .iter()
                            .map(|m| format!("`{}`", m))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                } else {
                    None
                };
                (combined, message)
            }
            Err(e) => (String::new(), Some(format!("{:#}", e))),
        };

        if let Some(message) = &message {
            tracing::warn!("check {} failed: {}", check.name, message);
        }

        CheckOutcome {
            name: check.name.clone(),
            kind: check.kind,
            passed: message.is_none(),
            output,
            message,
            duration: start.elapsed(),
        }
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.progress || total <= 1 {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Verifying");
        Some(pb)
    }
}

fn expand_check(
    check: &CheckSpec,
    vars: &Vars,
) -> Result<(String, Vec<String>, Vec<String>), template::TemplateError> {
    Ok((
        template::expand(&check.command, vars)?,
        template::expand_all(&check.args, vars)?,
        template::expand_all(&check.expect, vars)?,
    ))
}

/// Placeholder values for verification, rooted at the actual install.
fn install_vars(recipe: &Recipe, config: &BuildConfig, install: &InstallArtifacts) -> Vars {
    let mut vars = config.vars(recipe);
    vars.insert("prefix", install.prefix.display().to_string());
    vars.insert("bin", install.bin_dir.display().to_string());
    vars
}

/// Expand the recipe's variant table into runnable variants.
///
/// In regex mode placeholder values match literally, and braces meant for
/// the regex are written doubled (`\d{{2}}`).
pub fn test_variants(recipe: &Recipe, vars: &Vars, head: bool) -> Result<Vec<TestVariant>, RecipeError> {
    let test = &recipe.test;
    let invalid = |e: template::TemplateError| RecipeError::invalid(e.to_string());

    let matcher = if test.regex {
        let escaped: Vars = vars.iter().map(|(k, v)| (*k, regex::escape(v))).collect();
        let expected = template::expand(recipe.expectation(head), &escaped).map_err(invalid)?;
        Matcher::Regex(Regex::new(&expected).map_err(|e| {
            RecipeError::invalid(format!("invalid expectation regex `{}`: {}", expected, e))
        })?)
    } else {
        Matcher::Substring(template::expand(recipe.expectation(head), vars).map_err(invalid)?)
    };

    test.variants
        .ids
        .iter()
        .map(|id| {
            let mut vars = vars.clone();
            vars.insert("variant", id.clone());
            let program = template::expand(&test.variants.command, &vars).map_err(invalid)?;
            let args = template::expand_all(&test.variants.args, &vars).map_err(invalid)?;
            Ok(TestVariant {
                id: id.clone(),
                command: ProcessBuilder::new(program).args(args),
                matcher: matcher.clone(),
            })
        })
        .collect()
}
