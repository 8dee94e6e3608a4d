//! # xd-connectors
//!
//! Record-source connectors for xdr-digest.
//!
//! This crate defines the [`IncidentSource`] trait the pipeline reads through,
//! the incident/alert/artifact schemas, and the Cortex XDR and mock
//! implementations.

pub mod http;
pub mod records;
pub mod secure_string;
pub mod testing;
pub mod traits;
pub mod xdr;

pub use records::{AlertRecord, FileArtifact, IncidentDetail, IncidentSummary, NetworkArtifact};
pub use secure_string::SecureString;
pub use traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    FilterOperator, IncidentFilter, IncidentPage, IncidentSource, ListIncidentsRequest,
    SortDirection, SortSpec, TimeWindow,
};
pub use xdr::{CortexXdrConfig, CortexXdrConnector, MockBehavior, MockIncidentSource};
