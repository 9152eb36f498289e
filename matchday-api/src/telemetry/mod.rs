//! Matchday Telemetry
//!
//! Structured logging through `tracing`. JSON lines in production, human
//! readable output in debug mode.

pub mod tracer;

pub use tracer::{init_tracing, TelemetryConfig, DEFAULT_LOG_FILTER};
