//! `slipway plan` command
//!
//! Composes and prints the build plan without running anything. Useful for
//! checking what a recipe does on a platform other than the host.

use anyhow::{Context, Result};

use super::{build_config, load_recipe, platform_context, resolve_cc};
use crate::cli::PlanArgs;
use slipway::ops::plan;
use slipway::GlobalContext;

pub fn execute(args: PlanArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let recipe = load_recipe(&gctx, &args.recipe)?;

    let cc = resolve_cc(&gctx, &args.platform);
    let ctx = platform_context(&args.platform, &cc)?;
    let config = build_config(
        &gctx,
        &args.prefix,
        cc,
        args.tool_prefix.as_ref(),
        args.source.as_ref(),
        args.jobs,
    );

    let plan = plan(&recipe, &ctx, &config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
        println!("{}", json);
        return Ok(());
    }

    println!("{} v{} for {}", plan.package, plan.version, plan.context);
    println!("fingerprint: {}", plan.fingerprint);
    println!();

    println!("configure arguments:");
    for arg in plan.base_args() {
        println!("    {}", arg);
    }
    for arg in plan.conditional_args() {
        println!("  + {}", arg);
    }

    if !plan.env.is_empty() {
        println!();
        println!("environment:");
        for (key, value) in &plan.env {
            println!("    {}={}", key, value);
        }
    }

    println!();
    println!("steps:");
    for step in &plan.steps {
        println!("  {}: {}", step.name, plan.command(step).display_command());
    }

    Ok(())
}
