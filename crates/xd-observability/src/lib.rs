//! # xd-observability
//!
//! Logging and metrics infrastructure for xdr-digest.
//!
//! Structured logging goes through `tracing`; pipeline counters go through
//! the `metrics` facade and are mirrored in-process so a run can report its
//! own failure counts without an exporter installed.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging_with_config, LoggingConfig};
pub use metrics::{PipelineMetrics, RunCounters};
