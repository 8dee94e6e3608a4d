//! One fetch-aggregate-assess run against an incident source.

use crate::aggregate::{aggregate, AggregateReport};
use crate::collector::{CollectorConfig, PaginatedCollector};
use crate::detail::{DetailConfig, DetailFetcher};
use crate::error::{PipelineError, PipelineResult};
use crate::risk::{assess, RiskFlag};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use xd_connectors::{IncidentDetail, IncidentSource, IncidentSummary, TimeWindow};
use xd_observability::{PipelineMetrics, RunCounters};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Options for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Creation-time window; `None` reads the newest incidents regardless of age.
    pub window: Option<TimeWindow>,
    pub collector: CollectorConfig,
    pub detail: DetailConfig,
}

impl RunOptions {
    /// Options for the `hours` leading up to now.
    pub fn last_hours(hours: u32) -> Self {
        Self {
            window: Some(TimeWindow::last_hours(Utc::now().timestamp_millis(), hours)),
            ..Self::default()
        }
    }
}

/// Run summary handed to renderers and exporters.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub window: Option<TimeWindow>,
    /// Window length used for the incident rate.
    pub window_hours: f64,
    /// Matching incidents reported by the source.
    pub total_count: u64,
    /// Incidents actually collected.
    pub retrieved: usize,
    pub details_fetched: usize,
    pub detail_failures: usize,
    pub failed_incident_ids: Vec<String>,
    pub incidents_per_hour: f64,
    pub aggregate: AggregateReport,
    pub risk_flags: Vec<RiskFlag>,
    pub counters: RunCounters,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Summaries, newest first.
    pub incidents: Vec<IncidentSummary>,
    pub details: HashMap<String, IncidentDetail>,
    pub report: RunReport,
}

/// Wires collector, detail fetcher, aggregation and risk rules together.
pub struct Pipeline<S: IncidentSource + ?Sized + 'static> {
    source: Arc<S>,
    metrics: Arc<PipelineMetrics>,
}

impl<S: IncidentSource + ?Sized + 'static> Pipeline<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Runs the pipeline. Only a failed page aborts the run.
    #[instrument(skip(self, options), fields(source = self.source.name()))]
    pub async fn run(&self, options: RunOptions) -> PipelineResult<RunOutput> {
        if options.detail.max_concurrent == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_concurrent must be greater than zero".to_string(),
            ));
        }

        let collected = PaginatedCollector::new(Arc::clone(&self.source), options.collector.clone())
            .with_metrics(Arc::clone(&self.metrics))
            .collect(options.window.as_ref())
            .await?;

        info!(
            total_count = collected.total_count,
            retrieved = collected.incidents.len(),
            pages = collected.pages_fetched,
            "Incident collection complete"
        );

        if collected.incidents.is_empty() {
            info!("No incidents to analyze");
            let window_hours = options.window.map(|w| w.hours()).unwrap_or(0.0);
            return Ok(RunOutput {
                incidents: Vec::new(),
                details: HashMap::new(),
                report: self.build_report(
                    &options,
                    collected.total_count,
                    0,
                    Vec::new(),
                    window_hours,
                    AggregateReport::default(),
                    Vec::new(),
                ),
            });
        }

        let ids: Vec<String> = collected
            .incidents
            .iter()
            .map(|i| i.incident_id.clone())
            .collect();
        let outcome = DetailFetcher::new(Arc::clone(&self.source), options.detail.clone())
            .with_metrics(Arc::clone(&self.metrics))
            .fetch_all(&ids)
            .await;

        let report = aggregate(&collected.incidents, &outcome.details);
        let window_hours = options
            .window
            .map(|w| w.hours())
            .unwrap_or_else(|| observed_span_hours(&report));
        let risk_flags = assess(
            report.total_detected,
            report.high_critical_count(),
            report.incident_count,
            window_hours,
        );
        for flag in &risk_flags {
            self.metrics.record_risk_flag(flag.level.as_str());
            warn!(level = %flag.level, "{}", flag.message);
        }

        let failed_ids = outcome
            .failures
            .iter()
            .map(|f| f.incident_id.clone())
            .collect();

        Ok(RunOutput {
            report: self.build_report(
                &options,
                collected.total_count,
                outcome.fetched(),
                failed_ids,
                window_hours,
                report,
                risk_flags,
            ),
            incidents: collected.incidents,
            details: outcome.details,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_report(
        &self,
        options: &RunOptions,
        total_count: u64,
        details_fetched: usize,
        failed_incident_ids: Vec<String>,
        window_hours: f64,
        aggregate: AggregateReport,
        risk_flags: Vec<RiskFlag>,
    ) -> RunReport {
        RunReport {
            generated_at: Utc::now(),
            window: options.window,
            window_hours,
            total_count,
            retrieved: aggregate.incident_count,
            details_fetched,
            detail_failures: failed_incident_ids.len(),
            failed_incident_ids,
            incidents_per_hour: aggregate.incidents_per_hour(window_hours),
            aggregate,
            risk_flags,
            counters: self.metrics.snapshot(),
        }
    }
}

/// Hours between the oldest and newest incident, rounded up, at least one.
fn observed_span_hours(report: &AggregateReport) -> f64 {
    match (report.oldest_creation_time, report.newest_creation_time) {
        (Some(oldest), Some(newest)) => ((newest - oldest) as f64 / MS_PER_HOUR).ceil().max(1.0),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_spanning(oldest: i64, newest: i64) -> AggregateReport {
        AggregateReport {
            oldest_creation_time: Some(oldest),
            newest_creation_time: Some(newest),
            ..AggregateReport::default()
        }
    }

    #[test]
    fn test_observed_span_rounds_up() {
        assert_eq!(observed_span_hours(&report_spanning(0, 90 * 60 * 1000)), 2.0);
        assert_eq!(observed_span_hours(&report_spanning(0, 3_600_000)), 1.0);
    }

    #[test]
    fn test_observed_span_minimum_one_hour() {
        assert_eq!(observed_span_hours(&report_spanning(5, 5)), 1.0);
        assert_eq!(observed_span_hours(&AggregateReport::default()), 1.0);
    }

    #[test]
    fn test_last_hours_window() {
        let options = RunOptions::last_hours(24);
        let window = options.window.unwrap();
        assert!((window.hours() - 24.0).abs() < 1e-9);
    }
}
