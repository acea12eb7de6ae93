//! Command implementations

pub mod completions;
pub mod deps;
pub mod plan;
pub mod run;
pub mod verify;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::{InstallArgs, PlatformArgs};
use slipway::builder::BuildConfig;
use slipway::core::{CompilerId, HostOs, PlatformContext, Recipe};
use slipway::ops::RunReport;
use slipway::util::diagnostic::emit;
use slipway::util::process::{find_c_compiler, SystemRunner};
use slipway::GlobalContext;

/// Load the recipe named on the command line.
pub fn load_recipe(gctx: &GlobalContext, path: &Path) -> Result<Recipe> {
    let path = gctx.resolve(path);
    let recipe = Recipe::load(&path)?;
    tracing::debug!(
        "loaded recipe {} v{} from {}",
        recipe.package.name,
        recipe.package.version,
        path.display()
    );
    Ok(recipe)
}

/// The C compiler to configure with: flag, then config, then PATH.
pub fn resolve_cc(gctx: &GlobalContext, args: &PlatformArgs) -> PathBuf {
    args.cc
        .clone()
        .or_else(|| gctx.config().build.cc.clone())
        .or_else(find_c_compiler)
        .unwrap_or_else(|| PathBuf::from("cc"))
}

/// The platform to plan for. The compiler is detected only when not given.
pub fn platform_context(args: &PlatformArgs, cc: &Path) -> Result<PlatformContext> {
    let os = args.os.unwrap_or_else(HostOs::current);
    let compiler = match &args.compiler {
        Some(compiler) => compiler.clone(),
        None => CompilerId::detect(cc, &SystemRunner)
            .with_context(|| format!("could not identify {}; pass --compiler", cc.display()))?,
    };
    Ok(PlatformContext::new(os, compiler))
}

/// Freeze config file values and flags into a [`BuildConfig`].
pub fn build_config(
    gctx: &GlobalContext,
    prefix: &Path,
    cc: PathBuf,
    tool_prefix: Option<&PathBuf>,
    source: Option<&PathBuf>,
    jobs: Option<usize>,
) -> BuildConfig {
    let mut config = BuildConfig::new(gctx.resolve(prefix))
        .with_config(gctx.config())
        .with_cc(cc)
        .with_source_dir(gctx.resolve(source.map(PathBuf::as_path).unwrap_or(Path::new("."))));

    if let Some(tool_prefix) = tool_prefix {
        config = config.with_tool_prefix(tool_prefix);
    }
    if let Some(jobs) = jobs {
        config = config.with_jobs(jobs);
    }
    config
}

/// Apply the verification flags shared by `run` and `verify`.
pub fn apply_install_args(config: BuildConfig, args: &InstallArgs) -> BuildConfig {
    let mut config = config.with_head(args.head);
    if let Some(jobs) = args.verify_jobs {
        config = config.with_verify_jobs(jobs);
    }
    config
}

/// Print a diagnostic on stderr for every verification failure.
pub fn emit_failures(report: &RunReport, color: bool) {
    let Some(verification) = &report.verification else {
        return;
    };
    for error in verification.errors() {
        emit(&error.to_diagnostic(), color);
    }
}
