//! Build plan composition.
//!
//! [`compose`] turns a recipe, a platform context and a build configuration
//! into a [`BuildPlan`]: the exact configure arguments, environment and step
//! commands for one run. It is a pure function; identical inputs give
//! identical plans, down to the fingerprint.
//!
//! Argument order is fixed:
//!
//! 1. base arguments, in declaration order
//! 2. for each exclusive set, the arguments of its single matching branch
//! 3. every independent fragment whose condition holds, in declaration order

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::builder::context::BuildConfig;
use crate::core::condition::evaluate;
use crate::core::error::RecipeError;
use crate::core::platform::PlatformContext;
use crate::core::recipe::{ExclusiveSet, Recipe};
use crate::util::hash::Fingerprint;
use crate::util::process::ProcessBuilder;
use crate::util::template::{self, Vars};

/// A fully composed build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub package: String,
    pub version: String,
    pub context: PlatformContext,

    /// Composed configure arguments
    pub args: Vec<String>,

    /// How many leading entries of `args` are the base arguments
    pub base_len: usize,

    /// Which branch was taken for each exclusive set
    pub branches: BTreeMap<String, usize>,

    /// Environment overrides for every step
    pub env: BTreeMap<String, String>,

    /// Steps with every placeholder expanded
    pub steps: Vec<PlannedStep>,

    /// Directory the steps run in
    pub source_dir: PathBuf,

    /// SHA256 over every field above
    pub fingerprint: String,
}

/// One concrete build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl BuildPlan {
    /// The base portion of the arguments.
    pub fn base_args(&self) -> &[String] {
        &self.args[..self.base_len]
    }

    /// Arguments contributed by conditional fragments.
    pub fn conditional_args(&self) -> &[String] {
        &self.args[self.base_len..]
    }

    /// The process to run for a step.
    pub fn command(&self, step: &PlannedStep) -> ProcessBuilder {
        ProcessBuilder::new(&step.program)
            .args(&step.args)
            .envs(&self.env)
            .cwd(&self.source_dir)
    }
}

/// Compose the build plan for `recipe` under `ctx`.
///
/// Fails with [`RecipeError::ConfigurationRejected`] when a toolchain
/// exclusion matches, or when an exclusive set matches zero or more than
/// one branch.
pub fn compose(
    recipe: &Recipe,
    ctx: &PlatformContext,
    config: &BuildConfig,
) -> Result<BuildPlan, RecipeError> {
    recipe.check_toolchain(ctx)?;

    let vars = config.vars(recipe);
    let configure = &recipe.configure;

    let mut args = expand_list(&configure.args, &vars)?;
    let base_len = args.len();

    let mut branches = BTreeMap::new();
    for set in &configure.exclusive {
        let index = select_branch(set, ctx)?;
        tracing::debug!("exclusive set `{}`: branch {} selected", set.name, index);
        branches.insert(set.name.clone(), index);
        args.extend(expand_list(&set.branches[index].args, &vars)?);
    }

    for fragment in &configure.fragments {
        if evaluate(&fragment.when, ctx) {
            args.extend(expand_list(&fragment.args, &vars)?);
        }
    }

    let mut env = BTreeMap::new();
    for (key, value) in &recipe.env {
        env.insert(key.clone(), expand(value, &vars)?);
    }

    let mut steps = Vec::with_capacity(recipe.steps.len());
    for step in &recipe.steps {
        let mut step_args = expand_list(&step.args, &vars)?;
        if step.plan_args {
            step_args.extend(args.iter().cloned());
        }
        steps.push(PlannedStep {
            name: step.name.clone(),
            program: expand(&step.command, &vars)?,
            args: step_args,
        });
    }

    let mut plan = BuildPlan {
        package: recipe.package.name.clone(),
        version: recipe.package.version.clone(),
        context: ctx.clone(),
        args,
        base_len,
        branches,
        env,
        steps,
        source_dir: config.source_dir.clone(),
        fingerprint: String::new(),
    };
    plan.fingerprint = fingerprint(&plan);
    Ok(plan)
}

/// Index of the single branch of `set` that matches `ctx`.
fn select_branch(set: &ExclusiveSet, ctx: &PlatformContext) -> Result<usize, RecipeError> {
    let matched: Vec<usize> = set
        .branches
        .iter()
        .enumerate()
        .filter(|(_, b)| evaluate(&b.when, ctx))
        .map(|(i, _)| i)
        .collect();

    match matched.as_slice() {
        [index] => Ok(*index),
        [] => Err(RecipeError::rejected(
            format!("no branch of exclusive set `{}` matches", set.name),
            ctx.to_string(),
        )),
        many => Err(RecipeError::rejected(
            format!(
                "{} branches of exclusive set `{}` match ({})",
                many.len(),
                set.name,
                many.iter()
                    .map(|i| set.branches[*i].when.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ctx.to_string(),
        )),
    }
}

fn expand(s: &str, vars: &Vars) -> Result<String, RecipeError> {
    template::expand(s, vars).map_err(|e| RecipeError::invalid(e.to_string()))
}

fn expand_list(items: &[String], vars: &Vars) -> Result<Vec<String>, RecipeError> {
    template::expand_all(items, vars).map_err(|e| RecipeError::invalid(e.to_string()))
}

fn fingerprint(plan: &BuildPlan) -> String {
    let mut fp = Fingerprint::new();
    fp.update_str(&plan.package)
        .update_str(&plan.version)
        .update_str(plan.context.os.as_str())
        .update_str(&plan.context.compiler.to_string())
        .update_strs(plan.args.iter().map(String::as_str));
    for (key, value) in &plan.env {
        fp.update_pair(key, value);
    }
    for step in &plan.steps {
        fp.update_str(&step.name)
            .update_str(&step.program)
            .update_strs(step.args.iter().map(String::as_str));
    }
    fp.update_str(&plan.source_dir.display().to_string());
    fp.finish()
}
