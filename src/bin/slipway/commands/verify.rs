//! `slipway verify` command

use anyhow::{Context, Result};

use super::{
    apply_install_args, build_config, emit_failures, load_recipe, platform_context, resolve_cc,
};
use crate::cli::VerifyArgs;
use slipway::ops::verify::{format_report_for_output, HttpFetcher, OutputFormat};
use slipway::ops::{verify_only, RunOptions};
use slipway::util::diagnostic::{emit, Diagnostic};
use slipway::util::process::SystemRunner;
use slipway::GlobalContext;

pub fn execute(args: VerifyArgs, verbose: bool, color: bool) -> Result<()> {
    let output_format: OutputFormat = args
        .install
        .output_format
        .parse()
        .with_context(|| format!("invalid output format: {}", args.install.output_format))?;

    let gctx = GlobalContext::new()?;
    let recipe = load_recipe(&gctx, &args.recipe)?;

    let cc = resolve_cc(&gctx, &args.platform);
    let ctx = platform_context(&args.platform, &cc)?;
    let config = build_config(
        &gctx,
        &args.install.prefix,
        cc,
        args.install.tool_prefix.as_ref(),
        None,
        None,
    );
    let config = apply_install_args(config, &args.install);

    if !config.bin_dir().is_dir() {
        let warning = Diagnostic::warning(format!(
            "{} does not exist, every variant will fail",
            config.bin_dir().display()
        ))
        .with_suggestion("Pass the --prefix the recipe was installed to");
        emit(&warning, color);
    }

    let options = RunOptions {
        verbose,
        progress: output_format == OutputFormat::Human,
        ..Default::default()
    };

    let fetcher = HttpFetcher::from_config(gctx.config());
    let report = verify_only(&recipe, &ctx, &config, &SystemRunner, &fetcher, &options)?;

    let recipe_path = args.recipe.display().to_string();
    print!(
        "{}",
        format_report_for_output(&report, output_format, verbose, Some(&recipe_path))
    );

    // Exit with error code if verification failed
    if !report.passed {
        if verbose && output_format == OutputFormat::Human {
            emit_failures(&report, color);
        }
        std::process::exit(1);
    }

    Ok(())
}
