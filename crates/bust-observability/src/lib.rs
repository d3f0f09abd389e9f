//! Observability for the cache-busting loader.
//!
//! This crate provides:
//! - `LogEntry` - A structured log record for one load event
//! - `LoadLogger` - Level-filtered structured logging forwarded to `tracing`

mod logging;

pub use logging::*;

// Re-export level and format from bust-core, where the config lives
pub use bust_core::{LogConfig, LogFormat, LogLevel};
