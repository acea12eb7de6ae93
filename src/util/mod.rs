//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod hash;
pub mod process;
pub mod template;

use std::time::Duration;

pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;

/// Serialize a duration as whole milliseconds.
pub fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}
