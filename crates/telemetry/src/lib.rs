//! Internal telemetry for the inbox engine.
//!
//! Structured logs via `tracing`, plus in-process counters and component
//! health exposed on the receiver's health endpoints. No external metrics
//! system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
