//! Sequential, fail-fast execution of a build plan.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::builder::plan::BuildPlan;
use crate::core::error::RecipeError;
use crate::util::process::CommandRunner;

/// Runs the steps of a [`BuildPlan`] through a [`CommandRunner`].
pub struct RecipeExecutor<'a> {
    runner: &'a dyn CommandRunner,
    step_timeout: Option<Duration>,
    dry_run: bool,
    verbose: bool,
}

/// One step that ran to completion.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub command: String,
    #[serde(serialize_with = "crate::util::serialize_duration_ms")]
    pub duration: Duration,
}

/// Result of running every step of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub steps: Vec<StepRecord>,
    #[serde(serialize_with = "crate::util::serialize_duration_ms")]
    pub duration: Duration,
    /// Nothing was executed; commands were only printed
    pub dry_run: bool,
}

impl<'a> RecipeExecutor<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        RecipeExecutor {
            runner,
            step_timeout: None,
            dry_run: false,
            verbose: false,
        }
    }

    /// Kill any step running longer than `timeout`.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Print commands instead of running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run every step in order. The first failing step ends the run.
    pub fn run(&self, plan: &BuildPlan) -> Result<ExecutionResult, RecipeError> {
        let start = Instant::now();
        let mut steps = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let cmd = plan.command(step);
            let command = cmd.display_command();

            if self.dry_run {
                println!("{}", command);
                steps.push(StepRecord {
                    name: step.name.clone(),
                    command,
                    duration: Duration::ZERO,
                });
                continue;
            }

            eprintln!("{:>12} {}", capitalize(&step.name), plan.package);
            tracing::debug!("running: {}", command);

            let step_start = Instant::now();
            let output = self
                .runner
                .run(&cmd, self.step_timeout)
                .map_err(|e| RecipeError::BuildFailure {
                    step: step.name.clone(),
                    command: command.clone(),
                    status: None,
                    timed_out: false,
                    output: format!("{:#}", e),
                })?;

            if self.verbose {
                eprint!("{}", output.combined());
            }

            if !output.success() {
                tracing::error!("step `{}` failed: {}", step.name, command);
                return Err(RecipeError::BuildFailure {
                    step: step.name.clone(),
                    command,
                    status: output.status,
                    timed_out: output.timed_out,
                    output: output.combined(),
                });
            }

            steps.push(StepRecord {
                name: step.name.clone(),
                command,
                duration: step_start.elapsed(),
            });
        }

        let duration = start.elapsed();
        if !self.dry_run {
            eprintln!(
                "{:>12} {} v{} in {:.2}s",
                "Finished",
                plan.package,
                plan.version,
                duration.as_secs_f64()
            );
        }

        Ok(ExecutionResult {
            steps,
            duration,
            dry_run: self.dry_run,
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
