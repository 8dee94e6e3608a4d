//! # xd-core
//!
//! Fetch-aggregate-report pipeline for xdr-digest.
//!
//! Incident summaries are paged in by [`PaginatedCollector`], per-incident
//! details are fanned out through [`DetailFetcher`], and the pure
//! [`aggregate`] fold turns both into an [`AggregateReport`] that the
//! [`assess`] rules read to raise [`RiskFlag`]s. [`Pipeline`] wires the
//! stages together for a single run.

pub mod aggregate;
pub mod collector;
pub mod detail;
pub mod error;
pub mod histogram;
pub mod pipeline;
pub mod risk;
pub mod severity;
pub mod subnet;
pub mod timefmt;

pub use aggregate::{
    aggregate, derive_alert_name, is_blocked, is_detected, AggregateReport, HourBucket,
    SeverityRow, UnblockedAlert,
};
pub use collector::{CollectedIncidents, CollectorConfig, PaginatedCollector};
pub use detail::{DetailConfig, DetailFailure, DetailFetcher, DetailOutcome};
pub use error::{PipelineError, PipelineResult};
pub use histogram::Histogram;
pub use pipeline::{Pipeline, RunOptions, RunOutput, RunReport};
pub use risk::{assess, RiskFlag, RiskKind, RiskLevel};
pub use severity::Severity;
pub use subnet::rollup;
pub use timefmt::{format_epoch_ms, hour_key};
