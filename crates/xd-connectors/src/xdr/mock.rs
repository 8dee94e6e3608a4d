//! Mock incident source for testing.
//!
//! Serves an in-memory snapshot with the same paging, windowing and sorting
//! semantics as the real API. Supports failure injection and records call
//! counts plus peak detail-request concurrency for test verification.

use crate::records::{IncidentDetail, IncidentSummary};
use crate::traits::{
    Connector, ConnectorError, ConnectorHealth, ConnectorResult, IncidentPage, IncidentSource,
    ListIncidentsRequest,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Behavior configuration for failure injection.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Normal operation.
    #[default]
    Normal,
    /// `list_incidents` fails once it has been called this many times.
    FailListAfter { calls: u64, error: ConnectorError },
    /// `get_incident_detail` fails for these incident ids.
    FailDetailsFor(HashSet<String>),
    /// Every call fails.
    AlwaysFail(ConnectorError),
}

/// Mock incident source for testing.
pub struct MockIncidentSource {
    name: String,
    incidents: Arc<RwLock<Vec<IncidentSummary>>>,
    details: Arc<RwLock<HashMap<String, IncidentDetail>>>,
    behavior: Arc<RwLock<MockBehavior>>,
    detail_latency: Duration,
    list_calls: AtomicU64,
    detail_calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: Arc<RwLock<Vec<ListIncidentsRequest>>>,
}

impl MockIncidentSource {
    /// Creates an empty mock source.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            incidents: Arc::new(RwLock::new(Vec::new())),
            details: Arc::new(RwLock::new(HashMap::new())),
            behavior: Arc::new(RwLock::new(MockBehavior::Normal)),
            detail_latency: Duration::ZERO,
            list_calls: AtomicU64::new(0),
            detail_calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a mock source preloaded with incidents and details.
    pub fn with_data(
        name: &str,
        incidents: Vec<IncidentSummary>,
        details: Vec<IncidentDetail>,
    ) -> Self {
        let source = Self::new(name);
        let details = details
            .into_iter()
            .map(|d| (d.incident_id.clone(), d))
            .collect();
        Self {
            incidents: Arc::new(RwLock::new(incidents)),
            details: Arc::new(RwLock::new(details)),
            ..source
        }
    }

    /// Simulates network latency on every detail call.
    pub fn with_detail_latency(mut self, latency: Duration) -> Self {
        self.detail_latency = latency;
        self
    }

    /// Sets the mock behavior.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.write().await = behavior;
    }

    /// Adds an incident and its detail record.
    pub async fn add_incident(&self, incident: IncidentSummary, detail: Option<IncidentDetail>) {
        if let Some(detail) = detail {
            self.details
                .write()
                .await
                .insert(incident.incident_id.clone(), detail);
        }
        self.incidents.write().await.push(incident);
    }

    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> u64 {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// Highest number of detail requests observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every list request received, in order.
    pub async fn list_requests(&self) -> Vec<ListIncidentsRequest> {
        self.requests.read().await.clone()
    }

    async fn check_list_behavior(&self, call: u64) -> ConnectorResult<()> {
        match &*self.behavior.read().await {
            MockBehavior::AlwaysFail(e) => Err(e.clone()),
            MockBehavior::FailListAfter { calls, error } if call > *calls => Err(error.clone()),
            _ => Ok(()),
        }
    }

    async fn check_detail_behavior(&self, incident_id: &str) -> ConnectorResult<()> {
        match &*self.behavior.read().await {
            MockBehavior::AlwaysFail(e) => Err(e.clone()),
            MockBehavior::FailDetailsFor(ids) if ids.contains(incident_id) => Err(
                ConnectorError::RequestFailed(format!("HTTP 500: detail for {}", incident_id)),
            ),
            _ => Ok(()),
        }
    }
}

/// Decrements the in-flight counter when a detail call finishes.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockIncidentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn connector_type(&self) -> &str {
        "xdr"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match &*self.behavior.read().await {
            MockBehavior::AlwaysFail(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
            _ => Ok(ConnectorHealth::Healthy),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        Ok(!matches!(
            &*self.behavior.read().await,
            MockBehavior::AlwaysFail(_)
        ))
    }
}

#[async_trait]
impl IncidentSource for MockIncidentSource {
    async fn list_incidents(
        &self,
        request: &ListIncidentsRequest,
    ) -> ConnectorResult<IncidentPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.write().await.push(request.clone());
        self.check_list_behavior(call).await?;

        let window = request.window();
        let mut matching: Vec<IncidentSummary> = self
            .incidents
            .read()
            .await
            .iter()
            .filter(|i| match (&window, i.creation_time) {
                (Some(w), Some(t)) => w.contains(t),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));

        let total_count = matching.len() as u64;
        let start = request.search_from.min(matching.len());
        let end = request.search_to.min(matching.len());

        Ok(IncidentPage {
            incidents: matching[start..end].to_vec(),
            total_count,
        })
    }

    async fn get_incident_detail(
        &self,
        incident_id: &str,
        alerts_limit: u32,
    ) -> ConnectorResult<IncidentDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if !self.detail_latency.is_zero() {
            tokio::time::sleep(self.detail_latency).await;
        }
        self.check_detail_behavior(incident_id).await?;

        let mut detail = self
            .details
            .read()
            .await
            .get(incident_id)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound(format!("Incident not found: {}", incident_id)))?;
        detail.alerts.truncate(alerts_limit as usize);
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_detail, sample_incident};
    use crate::traits::TimeWindow;

    fn source_with(n: usize) -> MockIncidentSource {
        let incidents = (0..n)
            .map(|i| sample_incident(&format!("inc-{}", i), "low", 1_000 + i as i64))
            .collect();
        MockIncidentSource::with_data("mock", incidents, vec![])
    }

    #[tokio::test]
    async fn test_pages_are_sorted_newest_first() {
        let source = source_with(5);
        let page = source
            .list_incidents(&ListIncidentsRequest::page(None, 0, 2))
            .await
            .unwrap();

        assert_eq!(page.total_count, 5);
        assert_eq!(page.incidents.len(), 2);
        assert_eq!(page.incidents[0].incident_id, "inc-4");
        assert_eq!(page.incidents[1].incident_id, "inc-3");
    }

    #[tokio::test]
    async fn test_window_filter_applies_to_total_count() {
        let source = source_with(10);
        let window = TimeWindow {
            from_ms: 1_002,
            to_ms: 1_005,
        };
        let page = source
            .list_incidents(&ListIncidentsRequest::page(Some(&window), 0, 100))
            .await
            .unwrap();

        assert_eq!(page.total_count, 4);
        assert_eq!(page.incidents.len(), 4);
    }

    #[tokio::test]
    async fn test_offset_past_end_returns_empty_page() {
        let source = source_with(3);
        let page = source
            .list_incidents(&ListIncidentsRequest::page(None, 100, 100))
            .await
            .unwrap();
        assert!(page.incidents.is_empty());
        assert_eq!(page.total_count, 3);
    }

    #[tokio::test]
    async fn test_fail_list_after() {
        let source = source_with(3);
        source
            .set_behavior(MockBehavior::FailListAfter {
                calls: 1,
                error: ConnectorError::Timeout("slow".into()),
            })
            .await;

        let request = ListIncidentsRequest::page(None, 0, 1);
        assert!(source.list_incidents(&request).await.is_ok());
        assert!(source.list_incidents(&request).await.is_err());
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_detail_failure_injection_and_alert_limit() {
        let source = MockIncidentSource::new("mock");
        source
            .add_incident(
                sample_incident("a", "high", 1),
                Some(sample_detail("a", 5)),
            )
            .await;
        source
            .add_incident(sample_incident("b", "high", 2), Some(sample_detail("b", 1)))
            .await;
        source
            .set_behavior(MockBehavior::FailDetailsFor(HashSet::from(["b".to_string()])))
            .await;

        let detail = source.get_incident_detail("a", 3).await.unwrap();
        assert_eq!(detail.alerts.len(), 3);
        assert!(source.get_incident_detail("b", 3).await.is_err());
        assert!(matches!(
            source.get_incident_detail("missing", 3).await,
            Err(ConnectorError::NotFound(_))
        ));
        assert_eq!(source.peak_in_flight(), 1);
    }
}
