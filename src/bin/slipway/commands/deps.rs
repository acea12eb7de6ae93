//! `slipway deps` command

use anyhow::Result;

use super::{load_recipe, platform_context, resolve_cc};
use crate::cli::DepsArgs;
use slipway::core::DependencyPhase;
use slipway::GlobalContext;

pub fn execute(args: DepsArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let recipe = load_recipe(&gctx, &args.recipe)?;

    let cc = resolve_cc(&gctx, &args.platform);
    let ctx = platform_context(&args.platform, &cc)?;

    let deps = if args.all {
        recipe.dependencies()
    } else {
        recipe.dependencies_for(&ctx)
    };

    println!("{} v{} on {}", recipe.package.name, recipe.package.version, ctx);

    for phase in [DependencyPhase::Build, DependencyPhase::Runtime] {
        let in_phase: Vec<_> = deps.iter().filter(|d| d.phase == phase).collect();
        if in_phase.is_empty() {
            continue;
        }
        println!();
        println!("{} dependencies:", phase);
        for dep in in_phase {
            match (&dep.on, args.all) {
                (Some(condition), true) => println!("  {} (when {})", dep.name, condition),
                _ => println!("  {}", dep.name),
            }
        }
    }

    Ok(())
}
