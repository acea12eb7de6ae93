//! High-level operations behind the CLI commands.

pub mod slipway_run;
pub mod verify;

pub use slipway_run::{plan, run, verify_only, RunOptions, RunReport};
