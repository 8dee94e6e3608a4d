//! Metrics collection for the fetch-aggregate pipeline.
//!
//! Every recording goes to the `metrics` facade (a no-op until an exporter
//! is installed) and to in-process atomics that back [`RunCounters`].

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use std::time::Duration;

static REGISTER: Once = Once::new();

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub pages_fetched: u64,
    pub incidents_collected: u64,
    pub details_fetched: u64,
    pub detail_failures: u64,
}

/// Metrics recorder for one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pages_fetched: AtomicU64,
    incidents_collected: AtomicU64,
    details_fetched: AtomicU64,
    detail_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        REGISTER.call_once(Self::register_metrics);
        Self::default()
    }

    fn register_metrics() {
        describe_counter!("xd_pages_fetched_total", "Incident list pages fetched");
        describe_counter!(
            "xd_incidents_collected_total",
            "Incident summaries kept after paging and truncation"
        );
        describe_counter!(
            "xd_detail_fetch_total",
            "Incident detail requests by outcome"
        );
        describe_counter!(
            "xd_detail_fetch_failures_total",
            "Incident detail requests that failed"
        );
        describe_counter!("xd_risk_flags_total", "Risk flags raised by level");
        describe_histogram!(
            "xd_collection_duration_seconds",
            "Time spent paging incident summaries"
        );
        describe_histogram!(
            "xd_detail_fetch_duration_seconds",
            "Time spent fetching all incident details"
        );
    }

    pub fn record_page(&self) {
        counter!("xd_pages_fetched_total").increment(1);
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collection(&self, incidents: usize, elapsed: Duration) {
        counter!("xd_incidents_collected_total").increment(incidents as u64);
        histogram!("xd_collection_duration_seconds").record(elapsed.as_secs_f64());
        self.incidents_collected
            .fetch_add(incidents as u64, Ordering::Relaxed);
    }

    pub fn record_detail(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!("xd_detail_fetch_total", "outcome" => outcome).increment(1);
        if success {
            self.details_fetched.fetch_add(1, Ordering::Relaxed);
        } else {
            counter!("xd_detail_fetch_failures_total").increment(1);
            self.detail_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_detail_phase(&self, elapsed: Duration) {
        histogram!("xd_detail_fetch_duration_seconds").record(elapsed.as_secs_f64());
    }

    pub fn record_risk_flag(&self, level: &str) {
        counter!("xd_risk_flags_total", "level" => level.to_string()).increment(1);
    }

    pub fn snapshot(&self) -> RunCounters {
        RunCounters {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            incidents_collected: self.incidents_collected.load(Ordering::Relaxed),
            details_fetched: self.details_fetched.load(Ordering::Relaxed),
            detail_failures: self.detail_failures.load(Ordering::Relaxed),
        }
    }
}
