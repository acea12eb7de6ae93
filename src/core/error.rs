//! Recipe error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while loading, planning, building or verifying a recipe.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum RecipeError {
    /// The recipe file itself is malformed.
    #[error("invalid recipe: {message}")]
    #[diagnostic(code(slipway::recipe::invalid))]
    InvalidRecipe { message: String },

    /// An exclusive branch set matched zero or several branches, or a
    /// toolchain exclusion matched. Raised before any process runs.
    #[error("configuration rejected: {reason}")]
    #[diagnostic(code(slipway::plan::rejected))]
    ConfigurationRejected { reason: String, context: String },

    /// A configure/build/install step failed or timed out.
    #[error("build step `{step}` failed{}", exit_suffix(.status, .timed_out))]
    #[diagnostic(
        code(slipway::build::failed),
        help("Run with --verbose to see the full command line")
    )]
    BuildFailure {
        step: String,
        command: String,
        status: Option<i32>,
        timed_out: bool,
        output: String,
    },

    /// A test resource could not be fetched, verified or unpacked.
    #[error("failed to stage resource `{resource}`: {message}")]
    #[diagnostic(code(slipway::verify::staging))]
    ResourceStagingFailure { resource: String, message: String },

    /// A single variant produced unexpected output or exited non-zero.
    #[error("variant `{variant}` failed: {message}")]
    #[diagnostic(code(slipway::verify::variant))]
    VariantCheckFailure {
        variant: String,
        message: String,
        output: String,
    },

    /// A global post-install check failed.
    #[error("check `{check}` failed: {message}")]
    #[diagnostic(code(slipway::verify::integrity))]
    IntegrityCheckFailure {
        check: String,
        message: String,
        output: String,
    },
}

fn exit_suffix(status: &Option<i32>, timed_out: &bool) -> String {
    if *timed_out {
        " (timed out)".to_string()
    } else {
        match status {
            Some(code) => format!(" with exit code {}", code),
            None => " (terminated by signal)".to_string(),
        }
    }
}

impl RecipeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RecipeError::InvalidRecipe {
            message: message.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>, context: impl Into<String>) -> Self {
        RecipeError::ConfigurationRejected {
            reason: reason.into(),
            context: context.into(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            RecipeError::InvalidRecipe { message } => {
                Diagnostic::error(format!("invalid recipe: {}", message))
                    .with_suggestion(suggestions::CHECK_RECIPE)
            }

            RecipeError::ConfigurationRejected { reason, context } => {
                Diagnostic::error(format!("configuration rejected: {}", reason))
                    .with_context(format!("platform: {}", context))
                    .with_suggestion(suggestions::SELECT_PLATFORM)
            }

            RecipeError::BuildFailure {
                step,
                command,
                output,
                ..
            } => {
                let mut diag = Diagnostic::error(self.to_string())
                    .with_context(format!("step `{}` ran: {}", step, command));
                for line in tail(output, 20) {
                    diag = diag.with_context(line);
                }
                diag.with_suggestion(suggestions::BUILD_FAILED)
            }

            RecipeError::ResourceStagingFailure { resource, message } => Diagnostic::error(
                format!("failed to stage resource `{}`", resource),
            )
            .with_context(message.clone())
            .with_suggestion(suggestions::FETCH_FAILED),

            RecipeError::VariantCheckFailure {
                variant,
                message,
                output,
            } => {
                let mut diag = Diagnostic::error(format!("variant `{}` failed", variant))
                    .with_context(message.clone());
                for line in tail(output, 5) {
                    diag = diag.with_context(line);
                }
                diag
            }

            RecipeError::IntegrityCheckFailure {
                check,
                message,
                output,
            } => {
                let mut diag = Diagnostic::error(format!("check `{}` failed", check))
                    .with_context(message.clone());
                for line in tail(output, 5) {
                    diag = diag.with_context(line);
                }
                diag
            }
        }
    }
}

/// Last `n` non-empty lines of captured output.
fn tail(output: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|l| l.to_string()).collect()
}
