//! Per-incident detail fan-out.
//!
//! Each incident's alerts and artifacts are fetched on its own task, bounded
//! by a semaphore. Workers send their result over a channel to a single
//! consumer that owns the result map, so failures stay isolated and no
//! state is shared between workers.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, instrument, warn, Instrument};
use xd_connectors::{ConnectorError, ConnectorResult, IncidentDetail, IncidentSource};
use xd_observability::PipelineMetrics;

/// Progress is logged every this many completed fetches.
const PROGRESS_EVERY: usize = 50;

/// Detail fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailConfig {
    /// Maximum alerts requested per incident.
    pub alerts_limit: u32,
    /// Maximum detail requests in flight at once.
    pub max_concurrent: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            alerts_limit: 50,
            max_concurrent: 8,
            request_timeout_secs: 60,
        }
    }
}

impl DetailConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// An incident whose detail could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFailure {
    pub incident_id: String,
    pub error: ConnectorError,
}

/// Result of a fan-out: fetched details keyed by incident id, plus failures.
///
/// A failed incident appears only in `failures`, never in `details`.
#[derive(Debug, Clone, Default)]
pub struct DetailOutcome {
    pub details: HashMap<String, IncidentDetail>,
    pub failures: Vec<DetailFailure>,
}

impl DetailOutcome {
    pub fn fetched(&self) -> usize {
        self.details.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Fetches incident details with bounded concurrency.
pub struct DetailFetcher<S: IncidentSource + ?Sized + 'static> {
    source: Arc<S>,
    config: DetailConfig,
    metrics: Arc<PipelineMetrics>,
}

impl<S: IncidentSource + ?Sized + 'static> DetailFetcher<S> {
    pub fn new(source: Arc<S>, config: DetailConfig) -> Self {
        Self {
            source,
            config,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Fetches a single incident's detail, applying the request timeout.
    pub async fn fetch_one(&self, incident_id: &str) -> ConnectorResult<IncidentDetail> {
        fetch_with_timeout(
            self.source.as_ref(),
            incident_id,
            self.config.alerts_limit,
            self.config.request_timeout(),
        )
        .await
    }

    /// Fetches details for every id. Repeated ids are fetched once.
    #[instrument(skip(self, incident_ids), fields(count = incident_ids.len(), max_concurrent = self.config.max_concurrent))]
    pub async fn fetch_all(&self, incident_ids: &[String]) -> DetailOutcome {
        let mut seen = HashSet::new();
        let mut ids: Vec<String> = Vec::with_capacity(incident_ids.len());
        for id in incident_ids {
            if seen.insert(id.as_str()) {
                ids.push(id.clone());
            }
        }
        let total = ids.len();
        let mut outcome = DetailOutcome::default();
        if total == 0 {
            return outcome;
        }

        let started = Instant::now();
        let permits = self.config.max_concurrent.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        let (tx, mut rx) = mpsc::channel::<(String, ConnectorResult<IncidentDetail>)>(permits);

        let mut handles = Vec::with_capacity(total);
        for incident_id in ids {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let alerts_limit = self.config.alerts_limit;
            let timeout = self.config.request_timeout();
            let task_id = incident_id.clone();
            let span = xd_observability::incident_span!(task_id);

            let handle = tokio::spawn(
                async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => {
                            fetch_with_timeout(source.as_ref(), &task_id, alerts_limit, timeout)
                                .await
                        }
                        Err(_) => Err(ConnectorError::Internal(
                            "detail worker pool closed".to_string(),
                        )),
                    };
                    // The receiver only goes away if the consumer is dropped.
                    let _ = tx.send((task_id, result)).await;
                }
                .instrument(span),
            );
            handles.push((incident_id, handle));
        }
        drop(tx);

        let mut completed = 0;
        while let Some((incident_id, result)) = rx.recv().await {
            completed += 1;
            self.record(&mut outcome, incident_id, result);

            if completed % PROGRESS_EVERY == 0 || completed == total {
                info!(
                    "Progress: {}/{} ({:.0}%)",
                    completed,
                    total,
                    completed as f64 / total as f64 * 100.0
                );
            }
        }

        for (incident_id, handle) in handles {
            if let Err(e) = handle.await {
                self.record(
                    &mut outcome,
                    incident_id,
                    Err(ConnectorError::Internal(format!("detail task failed: {}", e))),
                );
            }
        }

        self.metrics.record_detail_phase(started.elapsed());
        info!(
            fetched = outcome.fetched(),
            failed = outcome.failed(),
            "Detail fetch complete"
        );
        outcome
    }

    fn record(
        &self,
        outcome: &mut DetailOutcome,
        incident_id: String,
        result: ConnectorResult<IncidentDetail>,
    ) {
        match result {
            Ok(detail) => {
                debug!(incident_id = %incident_id, alerts = detail.alerts.len(), "Fetched detail");
                self.metrics.record_detail(true);
                outcome.details.insert(incident_id, detail);
            }
            Err(error) => {
                warn!(incident_id = %incident_id, error = %error, "Detail fetch failed");
                self.metrics.record_detail(false);
                outcome.failures.push(DetailFailure { incident_id, error });
            }
        }
    }
}

async fn fetch_with_timeout<S: IncidentSource + ?Sized>(
    source: &S,
    incident_id: &str,
    alerts_limit: u32,
    timeout: Duration,
) -> ConnectorResult<IncidentDetail> {
    match tokio::time::timeout(timeout, source.get_incident_detail(incident_id, alerts_limit)).await
    {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout(format!(
            "detail for incident {} timed out after {}s",
            incident_id,
            timeout.as_secs()
        ))),
    }
}
