//! Slipway - build and verify one package from a declarative recipe
//!
//! This crate provides the library behind the `slipway` binary: recipe
//! loading, platform-conditional build planning, step execution, and the
//! post-install variant verification harness.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for slipway unit tests.
///
/// Only compiled for tests. Provides scripted process and download
/// implementations plus recipe fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::{compose, BuildConfig, BuildPlan};
pub use core::{PlatformContext, Recipe, RecipeError};
pub use util::context::GlobalContext;
