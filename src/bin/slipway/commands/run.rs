//! `slipway run` command

use anyhow::{Context, Result};

use super::{
    apply_install_args, build_config, emit_failures, load_recipe, platform_context, resolve_cc,
};
use crate::cli::RunArgs;
use slipway::ops::verify::{format_report_for_output, HttpFetcher, OutputFormat};
use slipway::ops::{run, RunOptions};
use slipway::util::process::SystemRunner;
use slipway::GlobalContext;

pub fn execute(args: RunArgs, verbose: bool, color: bool) -> Result<()> {
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
        args.source.as_ref(),
        args.jobs,
    );
    let config = apply_install_args(config, &args.install);

    let options = RunOptions {
        skip_verify: args.skip_verify,
        dry_run: args.dry_run,
        verbose,
        progress: output_format == OutputFormat::Human,
    };

    let fetcher = HttpFetcher::from_config(gctx.config());
    let report = run(&recipe, &ctx, &config, &SystemRunner, &fetcher, &options)?;

    if args.dry_run {
        return Ok(());
    }

    let recipe_path = args.recipe.display().to_string();
    print!(
        "{}",
        format_report_for_output(&report, output_format, verbose, Some(&recipe_path))
    );

    if !report.passed {
        if verbose && output_format == OutputFormat::Human {
            emit_failures(&report, color);
        }
        std::process::exit(1);
    }

    Ok(())
}
