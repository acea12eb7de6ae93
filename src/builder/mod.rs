//! Build plan composition and execution.

pub mod context;
pub mod executor;
pub mod plan;

pub use context::BuildConfig;
pub use executor::{ExecutionResult, RecipeExecutor, StepRecord};
pub use plan::{compose, BuildPlan, PlannedStep};
