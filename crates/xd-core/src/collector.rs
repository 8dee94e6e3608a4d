//! Paginated incident collection.
//!
//! Pages through `get_incidents` newest-first until the source runs dry or
//! the configured limit is reached. Any page failure aborts the collection.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use xd_connectors::{IncidentSource, IncidentSummary, ListIncidentsRequest, TimeWindow};
use xd_observability::PipelineMetrics;

/// Largest page the incidents endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Paging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Incidents requested per page (1..=100).
    pub page_size: usize,
    /// Maximum incidents to keep. `None` collects everything in the window.
    pub limit: Option<usize>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            limit: None,
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(PipelineError::InvalidConfig(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.limit == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Page size actually requested; never larger than the limit.
    pub fn effective_page_size(&self) -> usize {
        match self.limit {
            Some(limit) => self.page_size.min(limit),
            None => self.page_size,
        }
    }
}

/// Result of a collection run.
#[derive(Debug, Clone, Default)]
pub struct CollectedIncidents {
    /// Summaries ordered by `creation_time`, newest first.
    pub incidents: Vec<IncidentSummary>,
    /// Matching incidents reported by the first page.
    pub total_count: u64,
    pub pages_fetched: usize,
}

/// Drives repeated `list_incidents` calls into one ordered snapshot.
pub struct PaginatedCollector<S: IncidentSource + ?Sized> {
    source: Arc<S>,
    config: CollectorConfig,
    metrics: Arc<PipelineMetrics>,
}

impl<S: IncidentSource + ?Sized> PaginatedCollector<S> {
    pub fn new(source: Arc<S>, config: CollectorConfig) -> Self {
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

    /// Collects incidents created within `window`, or all incidents if `None`.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn collect(&self, window: Option<&TimeWindow>) -> PipelineResult<CollectedIncidents> {
        self.config.validate()?;
        let page_size = self.config.effective_page_size();
        let started = Instant::now();

        let mut incidents: Vec<IncidentSummary> = Vec::new();
        let mut total_count: Option<u64> = None;
        let mut search_from = 0;
        let mut page = 0;

        loop {
            page += 1;
            let request = ListIncidentsRequest::page(window, search_from, page_size);
            let response = self
                .source
                .list_incidents(&request)
                .await
                .map_err(|source| PipelineError::Collection { page, source })?;
            self.metrics.record_page();

            let fetched = response.incidents.len();
            let total = *total_count.get_or_insert(response.total_count);
            incidents.extend(response.incidents);

            info!(
                page,
                fetched,
                collected = incidents.len(),
                total_count = total,
                "Fetched incident page"
            );

            if fetched < page_size {
                debug!(page, "Short page, end of data");
                break;
            }
            if self.config.limit.is_some_and(|limit| incidents.len() >= limit) {
                debug!(page, "Limit reached");
                break;
            }
            search_from += page_size;
        }

        let mut incidents = dedupe(incidents);
        incidents.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        if let Some(limit) = self.config.limit {
            incidents.truncate(limit);
        }

        self.metrics
            .record_collection(incidents.len(), started.elapsed());

        Ok(CollectedIncidents {
            incidents,
            total_count: total_count.unwrap_or(0),
            pages_fetched: page,
        })
    }
}

/// Drops repeated and empty incident ids, keeping the first occurrence.
fn dedupe(incidents: Vec<IncidentSummary>) -> Vec<IncidentSummary> {
    let mut seen = HashSet::new();
    incidents
        .into_iter()
        .filter(|incident| {
            if incident.incident_id.is_empty() {
                warn!("Skipping incident without an id");
                return false;
            }
            if !seen.insert(incident.incident_id.clone()) {
                debug!(incident_id = %incident.incident_id, "Skipping duplicate incident");
                return false;
            }
            true
        })
        .collect()
}
