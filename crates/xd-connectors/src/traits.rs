//! Connector trait definitions for xdr-digest.
//!
//! The pipeline only ever talks to the detection platform through
//! [`IncidentSource`], so the Cortex XDR connector and the in-memory mock are
//! interchangeable.

use crate::records::{IncidentDetail, IncidentSummary};
use crate::secure_string::SecureString;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur in connectors.
///
/// Every variant is a transport failure from the pipeline's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    Healthy,
    Degraded(String),
    Unhealthy(String),
    Unknown,
}

/// Configuration for a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier.
    pub name: String,
    /// Base URL for the API (the tenant's `api-` FQDN).
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Transport-level retries. Zero means every failure surfaces immediately.
    #[serde(default)]
    pub max_retries: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Authentication configuration for the public API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication (mock servers, local proxies).
    None,
    /// Standard key: the key is sent verbatim in `Authorization`.
    XdrStandard {
        key_id: String,
        key: SecureString,
    },
    /// Advanced key: `Authorization` carries sha256(key + nonce + timestamp).
    XdrAdvanced {
        key_id: String,
        key: SecureString,
    },
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector type (e.g., "xdr").
    fn connector_type(&self) -> &str;

    /// Checks the health of the connector.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;

    /// Tests the connection to the external system.
    async fn test_connection(&self) -> ConnectorResult<bool>;
}

/// Read-only access to incidents on a detection platform.
#[async_trait]
pub trait IncidentSource: Connector {
    /// Fetches one page of incident summaries.
    async fn list_incidents(&self, request: &ListIncidentsRequest)
        -> ConnectorResult<IncidentPage>;

    /// Fetches alerts and artifacts for a single incident.
    async fn get_incident_detail(
        &self,
        incident_id: &str,
        alerts_limit: u32,
    ) -> ConnectorResult<IncidentDetail>;
}

/// Filter operator accepted by the incidents API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Gte,
    Lte,
    Eq,
    In,
}

/// A single `{field, operator, value}` filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

/// Sort direction; serialized under the `keyword` key the API expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification for incident listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    #[serde(rename = "keyword")]
    pub direction: SortDirection,
}

impl SortSpec {
    /// Newest incidents first.
    pub fn creation_time_desc() -> Self {
        Self {
            field: "creation_time".to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Inclusive `[from, to]` bound on `creation_time`, in epoch milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeWindow {
    /// Window ending at `to_ms` and spanning `hours`.
    pub fn last_hours(to_ms: i64, hours: u32) -> Self {
        Self {
            from_ms: to_ms - i64::from(hours) * 3_600_000,
            to_ms,
        }
    }

    /// Window length in hours, as a float for rate calculations.
    pub fn hours(&self) -> f64 {
        (self.to_ms - self.from_ms) as f64 / 3_600_000.0
    }

    pub fn contains(&self, epoch_ms: i64) -> bool {
        epoch_ms >= self.from_ms && epoch_ms <= self.to_ms
    }

    /// The `creation_time` gte/lte pair for [`ListIncidentsRequest::filters`].
    pub fn filters(&self) -> Vec<IncidentFilter> {
        vec![
            IncidentFilter {
                field: "creation_time".to_string(),
                operator: FilterOperator::Gte,
                value: self.from_ms.into(),
            },
            IncidentFilter {
                field: "creation_time".to_string(),
                operator: FilterOperator::Lte,
                value: self.to_ms.into(),
            },
        ]
    }
}

/// Body of a `get_incidents` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListIncidentsRequest {
    pub filters: Vec<IncidentFilter>,
    pub search_from: usize,
    pub search_to: usize,
    pub sort: SortSpec,
}

impl ListIncidentsRequest {
    /// Request for the offset range `[search_from, search_from + page_size)`.
    pub fn page(window: Option<&TimeWindow>, search_from: usize, page_size: usize) -> Self {
        Self {
            filters: window.map(TimeWindow::filters).unwrap_or_default(),
            search_from,
            search_to: search_from + page_size,
            sort: SortSpec::creation_time_desc(),
        }
    }

    /// Recovers the window from `creation_time` filters, if both bounds are present.
    pub fn window(&self) -> Option<TimeWindow> {
        let bound = |op: FilterOperator| {
            self.filters
                .iter()
                .find(|f| f.field == "creation_time" && f.operator == op)
                .and_then(|f| f.value.as_i64())
        };
        Some(TimeWindow {
            from_ms: bound(FilterOperator::Gte)?,
            to_ms: bound(FilterOperator::Lte)?,
        })
    }
}

/// One page of incident summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentPage {
    pub incidents: Vec<IncidentSummary>,
    /// Total matching incidents on the platform, independent of paging.
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offsets() {
        let request = ListIncidentsRequest::page(None, 200, 100);
        assert_eq!(request.search_from, 200);
        assert_eq!(request.search_to, 300);
        assert!(request.filters.is_empty());
    }

    #[test]
    fn test_window_filters_round_trip_through_request() {
        let window = TimeWindow::last_hours(1_700_000_000_000, 24);
        let request = ListIncidentsRequest::page(Some(&window), 0, 100);

        assert_eq!(request.filters.len(), 2);
        assert_eq!(request.window(), Some(window));
        assert!((window.hours() - 24.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sort_serializes_with_keyword() {
        let json = serde_json::to_value(SortSpec::creation_time_desc()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"field": "creation_time", "keyword": "desc"})
        );
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let window = TimeWindow {
            from_ms: 10,
            to_ms: 20,
        };
        assert!(window.contains(10));
        assert!(window.contains(20));
        assert!(!window.contains(21));
    }
}
