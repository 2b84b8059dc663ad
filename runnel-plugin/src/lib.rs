//! # Runnel Plugins
//!
//! Built-in observers for Runnel runs.
//!
//! - `TracingCallback`: reports every run through `tracing`
//! - `RunCollector`: keeps an in-memory tree of runs, handy in tests

pub mod collector;
pub mod tracer;

// Re-exports
pub use collector::{RunCollector, RunRecord, RunStatus};
pub use tracer::TracingCallback;
