//! Implementation of `slipway run` and `slipway verify`.
//!
//! The run is split into two phases. The build phase (exclusion check,
//! composition, execution) stops at the first error. The verification
//! phase only starts after a successful build and collects every failure
//! into the report instead.

use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use crate::builder::context::BuildConfig;
use crate::builder::executor::{ExecutionResult, RecipeExecutor};
use crate::builder::plan::{compose, BuildPlan};
use crate::core::platform::PlatformContext;
use crate::core::recipe::Recipe;
use crate::ops::verify::{Fetcher, InstallArtifacts, VariantHarness, VerificationReport};
use crate::util::process::CommandRunner;
use crate::util::serialize_duration_ms;

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after installing
    pub skip_verify: bool,

    /// Print the build commands without running anything
    pub dry_run: bool,

    /// Echo step output
    pub verbose: bool,

    /// Show a progress bar during verification
    pub progress: bool,
}

/// Outcome of a run whose build phase succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub package: String,
    pub version: String,
    pub platform: String,

    /// Plan fingerprint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// `None` when only verifying an existing install
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<ExecutionResult>,

    /// `None` when verification was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,

    #[serde(serialize_with = "serialize_duration_ms")]
    pub total_duration: Duration,

    /// Overall verdict, set once everything else is filled in
    pub passed: bool,
}

impl RunReport {
    fn new(recipe: &Recipe, ctx: &PlatformContext) -> Self {
        RunReport {
            package: recipe.package.name.clone(),
            version: recipe.package.version.clone(),
            platform: ctx.to_string(),
            fingerprint: None,
            build: None,
            verification: None,
            total_duration: Duration::ZERO,
            passed: false,
        }
    }

    fn finish(mut self, start: Instant) -> Self {
        self.total_duration = start.elapsed();
        self.passed = self.verification.as_ref().map_or(true, |v| v.passed());
        self
    }
}

/// Build, install and verify `recipe` on `ctx`.
///
/// Build-phase failures are returned as a [`RecipeError`] wrapped in the
/// error; verification failures are in the report.
///
/// [`RecipeError`]: crate::core::error::RecipeError
pub fn run(
    recipe: &Recipe,
    ctx: &PlatformContext,
    config: &BuildConfig,
    runner: &dyn CommandRunner,
    fetcher: &dyn Fetcher,
    options: &RunOptions,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(recipe, ctx);

    tracing::info!(
        "Building {} v{} for {}",
        recipe.package.name,
        recipe.package.version,
        ctx
    );

    // Terminal before anything is composed or spawned.
    recipe.check_toolchain(ctx)?;

    let plan = plan(recipe, ctx, config)?;
    report.fingerprint = Some(plan.fingerprint.clone());

    let executor = RecipeExecutor::new(runner)
        .step_timeout(config.step_timeout)
        .dry_run(options.dry_run)
        .verbose(options.verbose);
    let build = executor.run(&plan)?;
    report.build = Some(build);

    if options.skip_verify || options.dry_run {
        tracing::info!("Skipping verification");
        return Ok(report.finish(start));
    }

    let install = InstallArtifacts::new(&config.prefix);
    report.verification = Some(verify_install(recipe, ctx, config, runner, fetcher, &install, options)?);

    Ok(report.finish(start))
}

/// Verify an existing install without building.
pub fn verify_only(
    recipe: &Recipe,
    ctx: &PlatformContext,
    config: &BuildConfig,
    runner: &dyn CommandRunner,
    fetcher: &dyn Fetcher,
    options: &RunOptions,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(recipe, ctx);

    let install = InstallArtifacts::new(&config.prefix);
    report.verification = Some(verify_install(recipe, ctx, config, runner, fetcher, &install, options)?);

    Ok(report.finish(start))
}

/// Compose the plan for `recipe`, logging what was chosen.
pub fn plan(recipe: &Recipe, ctx: &PlatformContext, config: &BuildConfig) -> Result<BuildPlan> {
    let plan = compose(recipe, ctx, config)?;
    tracing::debug!(
        "plan {}: {} argument(s), {} conditional",
        &plan.fingerprint[..16],
        plan.args.len(),
        plan.conditional_args().len()
    );
    Ok(plan)
}

fn verify_install(
    recipe: &Recipe,
    ctx: &PlatformContext,
    config: &BuildConfig,
    runner: &dyn CommandRunner,
    fetcher: &dyn Fetcher,
    install: &InstallArtifacts,
    options: &RunOptions,
) -> Result<VerificationReport> {
    let report = VariantHarness::new(runner, fetcher)
        .with_config(config)
        .progress(options.progress && !options.verbose)
        .verify(recipe, ctx, config, install)?;

    if report.passed() {
        tracing::info!(
            "All {} variant(s) and {} check(s) passed",
            report.total(),
            report.checks.len()
        );
    } else {
        tracing::warn!(
            "{} of {} variant(s) failed",
            report.failing().len(),
            report.total()
        );
    }
    Ok(report)
}
