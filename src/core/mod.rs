//! Core data structures for slipway.
//!
//! - Platform contexts and the conditions evaluated against them
//! - Recipes and their declared dependencies
//! - The error type shared by planning, building and verification

pub mod condition;
pub mod dependency;
pub mod error;
pub mod platform;
pub mod recipe;

pub use condition::{coverage, evaluate, Coverage, PlatformCondition};
pub use dependency::{Dependency, DependencyPhase};
pub use error::RecipeError;
pub use platform::{CompilerFamily, CompilerId, HostOs, PlatformContext};
pub use recipe::Recipe;
