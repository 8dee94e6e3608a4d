//! Error types for the incident pipeline.

use thiserror::Error;
use xd_connectors::ConnectorError;

/// Errors that abort a pipeline run.
///
/// Detail-fetch failures never surface here; they are counted in
/// [`crate::DetailOutcome`] and the run continues without them.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A page request failed, so no data is returned for the run.
    #[error("Incident collection failed on page {page}: {source}")]
    Collection {
        page: usize,
        #[source]
        source: ConnectorError,
    },

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
