//! Aggregation of incidents and their details into report views.
//!
//! [`aggregate`] is a pure fold: it reads summaries in order, looks up each
//! summary's detail by id, and returns one [`AggregateReport`]. The same
//! input always yields the same report, including key order.

use crate::histogram::Histogram;
use crate::severity::Severity;
use crate::subnet;
use crate::timefmt::hour_key;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use xd_connectors::records::non_empty;
use xd_connectors::{AlertRecord, FileArtifact, IncidentDetail, IncidentSummary};

/// Placeholder for a summary field that is missing or blank.
pub const UNKNOWN: &str = "unknown";

const GENERATED_BY: &str = "generated by";
const BLOCKED_MARKERS: [&str; 2] = ["Prevented", "Blocked"];
const DETECTED_MARKERS: [&str; 2] = ["Detected", "Allowed"];

/// Extracts the alert name from an incident description.
///
/// `'Malware' generated by RuleXYZ` yields `Malware`: the text before the
/// first `generated by`, trimmed, with one surrounding quote pair removed.
/// Descriptions without the marker are returned unchanged.
pub fn derive_alert_name(description: &str) -> String {
    match description.find(GENERATED_BY) {
        Some(idx) => strip_quote_pair(description[..idx].trim()).to_string(),
        None => description.to_string(),
    }
}

fn strip_quote_pair(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn label_or_unknown(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN,
    }
}

/// True for action labels such as `Prevented (Blocked)`.
pub fn is_blocked(action: &str) -> bool {
    BLOCKED_MARKERS.iter().any(|m| action.contains(m))
}

/// True for action labels such as `Detected (Reported)`.
pub fn is_detected(action: &str) -> bool {
    DETECTED_MARKERS.iter().any(|m| action.contains(m))
}

/// Incidents created within one UTC hour.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HourBucket {
    pub total: u64,
    pub severity: Histogram,
    pub alert_names: Histogram,
}

impl HourBucket {
    /// Most frequent alert name in the hour; ties go to the first seen.
    pub fn top_alert(&self) -> Option<(&str, u64)> {
        self.alert_names.most_common()
    }

    pub fn high_or_critical(&self) -> u64 {
        self.severity.get(Severity::High.as_str()) + self.severity.get(Severity::Critical.as_str())
    }
}

/// An alert whose action was a detection rather than a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnblockedAlert {
    pub incident_id: String,
    pub alert_id: Option<String>,
    pub name: Option<String>,
    pub action: String,
    pub severity: Option<String>,
    pub host_ip: Option<String>,
    pub host_name: Option<String>,
    pub detection_timestamp: Option<i64>,
    pub process_image_name: Option<String>,
    pub process_command_line: Option<String>,
    pub actor_image_name: Option<String>,
    pub actor_command_line: Option<String>,
    pub file_path: Option<String>,
    pub file_sha256: Option<String>,
}

impl UnblockedAlert {
    fn from_alert(incident_id: &str, action: &str, alert: &AlertRecord) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            alert_id: alert.alert_id.clone(),
            name: alert.name.clone(),
            action: action.to_string(),
            severity: alert.severity.clone(),
            host_ip: alert.host_ip.clone(),
            host_name: alert.host_name.clone(),
            detection_timestamp: alert.detection_timestamp,
            process_image_name: alert.action_process_image_name.clone(),
            process_command_line: alert.action_process_image_command_line.clone(),
            actor_image_name: alert.actor_process_image_name.clone(),
            actor_command_line: alert.actor_process_command_line.clone(),
            file_path: alert.action_file_path.clone(),
            file_sha256: alert.action_file_sha256.clone(),
        }
    }
}

/// One severity line of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityRow {
    pub severity: String,
    pub count: u64,
    pub percent: f64,
}

/// Every view derived from one run's summaries and details.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateReport {
    pub incident_count: usize,
    /// Alerts across all fetched details.
    pub alert_count: usize,
    pub unique_hosts: usize,
    pub newest_creation_time: Option<i64>,
    pub oldest_creation_time: Option<i64>,

    pub severity: Histogram,
    pub status: Histogram,
    pub sources: Histogram,
    pub hosts: Histogram,
    pub users: Histogram,
    pub alert_names: Histogram,
    /// Keyed by `YYYY-MM-DD HH:00` (UTC), or `N/A` without a creation time.
    pub hourly: BTreeMap<String, HourBucket>,

    pub actions: Histogram,
    pub categories: Histogram,
    pub mitre_tactics: Histogram,
    pub mitre_techniques: Histogram,
    pub external_hostnames: Histogram,
    pub remote_ips: Histogram,
    pub local_ips: Histogram,
    pub remote_ports: Histogram,
    pub countries: Histogram,
    pub subnets: Histogram,

    pub total_blocked: u64,
    pub total_detected: u64,
    pub unblocked_alerts: Vec<UnblockedAlert>,
    pub high_critical_incident_ids: Vec<String>,

    pub file_artifact_count: usize,
    pub file_verdicts: Histogram,
    pub file_artifacts: Vec<FileArtifact>,
}

impl AggregateReport {
    pub fn high_critical_count(&self) -> usize {
        self.high_critical_incident_ids.len()
    }

    /// Known severities most severe first, then any other labels by count.
    pub fn severity_rows(&self) -> Vec<SeverityRow> {
        let known: Vec<&str> = Severity::DESCENDING.iter().map(Severity::as_str).collect();
        let ordered = known
            .iter()
            .map(|label| (*label, self.severity.get(label)))
            .chain(
                self.severity
                    .ranked()
                    .into_iter()
                    .filter(|(label, _)| !known.contains(label)),
            );

        ordered
            .filter(|(_, count)| *count > 0)
            .map(|(label, count)| SeverityRow {
                severity: label.to_string(),
                count,
                percent: percent(count, self.incident_count),
            })
            .collect()
    }

    /// Incidents per hour over `window_hours`; zero for an empty window.
    pub fn incidents_per_hour(&self, window_hours: f64) -> f64 {
        if window_hours <= 0.0 {
            return 0.0;
        }
        self.incident_count as f64 / window_hours
    }

    pub fn high_critical_percent(&self) -> f64 {
        percent(self.high_critical_count() as u64, self.incident_count)
    }

    pub fn top_alert_name(&self) -> Option<(&str, u64)> {
        self.alert_names.most_common()
    }

    pub fn top_country(&self) -> Option<(&str, u64)> {
        self.countries.most_common()
    }

    pub fn top_subnet(&self) -> Option<(&str, u64)> {
        self.subnets.most_common()
    }
}

fn percent(count: u64, of: usize) -> f64 {
    if of == 0 {
        return 0.0;
    }
    count as f64 / of as f64 * 100.0
}

/// Folds summaries and their details into an [`AggregateReport`].
///
/// Details are visited in summary order; details whose id has no summary
/// are ignored.
pub fn aggregate(
    summaries: &[IncidentSummary],
    details: &HashMap<String, IncidentDetail>,
) -> AggregateReport {
    let mut report = AggregateReport {
        incident_count: summaries.len(),
        ..AggregateReport::default()
    };

    for summary in summaries {
        add_summary(&mut report, summary);
    }

    for summary in summaries {
        if let Some(detail) = details.get(&summary.incident_id) {
            add_detail(&mut report, detail);
        }
    }

    report.unique_hosts = report.hosts.len();
    report.file_artifact_count = report.file_artifacts.len();
    report.subnets = subnet::rollup(&report.external_hostnames);
    report
}

fn add_summary(report: &mut AggregateReport, summary: &IncidentSummary) {
    let severity = label_or_unknown(summary.severity.as_deref());
    let status = label_or_unknown(summary.status.as_deref());
    let alert_name = summary
        .description
        .as_deref()
        .map(derive_alert_name)
        .unwrap_or_else(|| UNKNOWN.to_string());

    report.severity.add(severity);
    report.status.add(status);
    for source in &summary.incident_sources {
        report.sources.add(source.as_str());
    }
    for host in &summary.hosts {
        report.hosts.add(host.as_str());
    }
    for user in &summary.users {
        report.users.add(user.as_str());
    }
    report.alert_names.add(alert_name.as_str());

    let bucket = report
        .hourly
        .entry(hour_key(summary.creation_time))
        .or_default();
    bucket.total += 1;
    bucket.severity.add(severity);
    bucket.alert_names.add(alert_name);

    if Severity::from_label(severity).is_some_and(|s| s.is_high_or_critical()) {
        report
            .high_critical_incident_ids
            .push(summary.incident_id.clone());
    }

    if let Some(created) = summary.creation_time.filter(|t| *t != 0) {
        report.newest_creation_time = Some(report.newest_creation_time.map_or(created, |t| t.max(created)));
        report.oldest_creation_time = Some(report.oldest_creation_time.map_or(created, |t| t.min(created)));
    }
}

fn add_detail(report: &mut AggregateReport, detail: &IncidentDetail) {
    report.alert_count += detail.alerts.len();

    for alert in &detail.alerts {
        add_alert(report, &detail.incident_id, alert);
    }

    for artifact in &detail.network_artifacts {
        if let Some(country) = non_empty(artifact.country.as_deref()) {
            report.countries.add(country);
        }
    }

    for artifact in &detail.file_artifacts {
        report
            .file_verdicts
            .add(non_empty(artifact.wildfire_verdict.as_deref()).unwrap_or(UNKNOWN));
        report.file_artifacts.push(artifact.clone());
    }
}

fn add_alert(report: &mut AggregateReport, incident_id: &str, alert: &AlertRecord) {
    if let Some(action) = alert.action_label() {
        report.actions.add(action);
        // Both totals may count the same alert; neither may count it.
        if is_blocked(action) {
            report.total_blocked += 1;
        }
        if is_detected(action) {
            report.total_detected += 1;
            report
                .unblocked_alerts
                .push(UnblockedAlert::from_alert(incident_id, action, alert));
        }
    }

    if let Some(category) = alert.category.as_deref() {
        report.categories.add(label_or_unknown(Some(category)));
    }

    let optional = [
        (&mut report.mitre_tactics, &alert.mitre_tactic),
        (&mut report.mitre_techniques, &alert.mitre_technique),
        (&mut report.external_hostnames, &alert.action_external_hostname),
        (&mut report.remote_ips, &alert.action_remote_ip),
        (&mut report.local_ips, &alert.action_local_ip),
    ];
    for (histogram, value) in optional {
        if let Some(value) = non_empty(value.as_deref()) {
            histogram.add(value);
        }
    }

    if let Some(port) = alert.action_remote_port.filter(|p| *p != 0) {
        report.remote_ports.add(port.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xd_connectors::testing::{
        sample_alert, sample_detail, sample_file_artifact, sample_incident,
        sample_network_artifact,
    };

    // 2023-11-14 22:13:20 UTC
    const TS: i64 = 1_700_000_000_000;
    const HOUR: i64 = 3_600_000;

    fn details_of(details: Vec<IncidentDetail>) -> HashMap<String, IncidentDetail> {
        details
            .into_iter()
            .map(|d| (d.incident_id.clone(), d))
            .collect()
    }

    fn with_description(mut incident: IncidentSummary, description: &str) -> IncidentSummary {
        incident.description = Some(description.to_string());
        incident
    }

    #[test]
    fn test_derive_alert_name() {
        assert_eq!(derive_alert_name("'Malware' generated by RuleXYZ"), "Malware");
        assert_eq!(derive_alert_name("Suspicious activity"), "Suspicious activity");
    }

    #[test]
    fn test_derive_alert_name_splits_on_first_marker() {
        assert_eq!(
            derive_alert_name("'Port Scan' generated by XDR generated by BIOC"),
            "Port Scan"
        );
    }

    #[test]
    fn test_derive_alert_name_quote_handling() {
        assert_eq!(derive_alert_name("\"Quoted\" generated by x"), "Quoted");
        assert_eq!(derive_alert_name("''Twice'' generated by x"), "'Twice'");
        assert_eq!(derive_alert_name("'Unbalanced\" generated by x"), "'Unbalanced\"");
        assert_eq!(derive_alert_name("  Bare name   generated by x"), "Bare name");
        assert_eq!(derive_alert_name("' generated by x"), "'");
        assert_eq!(derive_alert_name("generated by x"), "");
    }

    #[test]
    fn test_derive_alert_name_leaves_unmarked_text_untouched() {
        assert_eq!(derive_alert_name("  'Spaced'  "), "  'Spaced'  ");
    }

    #[test]
    fn test_summary_histograms() {
        let mut a = sample_incident("1", "high", TS);
        a.incident_sources = vec!["XDR Agent".into(), "XDR Analytics".into()];
        a.users = vec!["corp\\alice".into()];
        let mut b = sample_incident("2", "low", TS);
        b.status = Some(String::new());
        b.hosts = vec![];
        let summaries = vec![a, b];

        let report = aggregate(&summaries, &HashMap::new());

        assert_eq!(report.incident_count, 2);
        assert_eq!(report.severity.get("high"), 1);
        assert_eq!(report.status.get("new"), 1);
        assert_eq!(report.status.get(UNKNOWN), 1);
        assert_eq!(report.sources.get("XDR Agent"), 2);
        assert_eq!(report.sources.get("XDR Analytics"), 1);
        assert_eq!(report.users.get("corp\\alice"), 1);
        assert_eq!(report.unique_hosts, 1);
        assert_eq!(report.high_critical_incident_ids, vec!["1"]);
    }

    #[test]
    fn test_missing_summary_fields_use_unknown() {
        let mut incident = sample_incident("1", "low", TS);
        incident.severity = None;
        incident.description = None;

        let report = aggregate(&[incident], &HashMap::new());
        assert_eq!(report.severity.get(UNKNOWN), 1);
        assert_eq!(report.alert_names.get(UNKNOWN), 1);
        assert_eq!(report.high_critical_count(), 0);
    }

    #[test]
    fn test_hourly_buckets_sum_to_incident_count() {
        let summaries = vec![
            sample_incident("1", "high", TS),
            sample_incident("2", "medium", TS + 10 * 60 * 1000),
            sample_incident("3", "low", TS + HOUR),
            sample_incident("4", "critical", TS + 5 * HOUR),
            sample_incident("5", "low", 0),
        ];
        let report = aggregate(&summaries, &HashMap::new());

        let total: u64 = report.hourly.values().map(|b| b.total).sum();
        assert_eq!(total, summaries.len() as u64);
        assert_eq!(report.hourly["2023-11-14 22:00"].total, 2);
        assert_eq!(report.hourly["2023-11-14 22:00"].high_or_critical(), 1);
        assert_eq!(report.hourly["N/A"].total, 1);
        assert_eq!(report.newest_creation_time, Some(TS + 5 * HOUR));
        assert_eq!(report.oldest_creation_time, Some(TS));
    }

    #[test]
    fn test_hour_bucket_top_alert_ties_go_to_first_seen() {
        let summaries = vec![
            with_description(sample_incident("1", "low", TS), "'Beta' generated by x"),
            with_description(sample_incident("2", "low", TS), "'Alpha' generated by x"),
            with_description(sample_incident("3", "low", TS), "'Alpha' generated by x"),
            with_description(sample_incident("4", "low", TS), "'Beta' generated by x"),
        ];
        let report = aggregate(&summaries, &HashMap::new());
        let bucket = &report.hourly["2023-11-14 22:00"];
        assert_eq!(bucket.top_alert(), Some(("Beta", 2)));
    }

    #[test]
    fn test_severity_percentages_sum_to_100() {
        let summaries: Vec<_> = ["critical", "high", "high", "medium", "low", "informational", "bogus"]
            .iter()
            .enumerate()
            .map(|(i, sev)| sample_incident(&i.to_string(), sev, TS))
            .collect();
        let report = aggregate(&summaries, &HashMap::new());
        let rows = report.severity_rows();

        let labels: Vec<_> = rows.iter().map(|r| r.severity.as_str()).collect();
        assert_eq!(
            labels,
            vec!["critical", "high", "medium", "low", "informational", "bogus"]
        );
        let sum: f64 = rows.iter().map(|r| r.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_alert_fields_contribute_nothing() {
        let summaries = vec![sample_incident("1", "low", TS)];
        let mut detail = sample_detail("1", 0);
        detail.alerts.push(AlertRecord::default());
        let mut partial = AlertRecord {
            category: Some(String::new()),
            action_remote_port: Some(0),
            action_external_hostname: Some(String::new()),
            ..AlertRecord::default()
        };
        partial.mitre_tactic = Some("TA0007 - Discovery".into());
        detail.alerts.push(partial);

        let report = aggregate(&summaries, &details_of(vec![detail]));

        assert_eq!(report.alert_count, 2);
        assert!(report.actions.is_empty());
        assert_eq!(report.categories.get(UNKNOWN), 1);
        assert_eq!(report.categories.total(), 1);
        assert!(report.remote_ports.is_empty());
        assert!(report.external_hostnames.is_empty());
        assert!(report.mitre_techniques.is_empty());
        assert_eq!(report.mitre_tactics.get("TA0007 - Discovery"), 1);
    }

    #[test]
    fn test_alert_network_histograms() {
        let summaries = vec![sample_incident("1", "low", TS)];
        let mut detail = sample_detail("1", 0);
        for (host, remote) in [("203.0.113.5", 22), ("203.0.113.9", 22), ("scanner.example", 3389)] {
            let mut alert = sample_alert("a", "Port Scan", "Detected (Reported)");
            alert.action_external_hostname = Some(host.to_string());
            alert.action_remote_ip = Some("10.0.0.10".to_string());
            alert.action_local_ip = Some("10.0.0.11".to_string());
            alert.action_remote_port = Some(remote);
            detail.alerts.push(alert);
        }

        let report = aggregate(&summaries, &details_of(vec![detail]));

        assert_eq!(report.remote_ports.get("22"), 2);
        assert_eq!(report.remote_ports.get("3389"), 1);
        assert_eq!(report.remote_ips.get("10.0.0.10"), 3);
        assert_eq!(report.local_ips.get("10.0.0.11"), 3);
        assert_eq!(report.subnets.get("203.0.113.0/24"), 2);
        assert_eq!(report.subnets.len(), 1);
        assert_eq!(report.top_subnet(), Some(("203.0.113.0/24", 2)));
    }

    #[test]
    fn test_block_detect_classification_is_not_a_partition() {
        let summaries = vec![sample_incident("1", "low", TS)];
        let mut detail = sample_detail("1", 0);
        detail.alerts = vec![
            sample_alert("1", "A", "Prevented (Blocked)"),
            sample_alert("2", "B", "Detected (Reported)"),
            sample_alert("3", "C", "Detected (Prevented)"),
            sample_alert("4", "D", "Reported"),
            sample_alert("5", "E", "Allowed"),
        ];

        let report = aggregate(&summaries, &details_of(vec![detail]));

        assert_eq!(report.total_blocked, 2);
        assert_eq!(report.total_detected, 3);
        let ids: Vec<_> = report
            .unblocked_alerts
            .iter()
            .filter_map(|a| a.alert_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["2", "3", "5"]);
        assert_eq!(report.actions.get("Reported"), 1);
    }

    #[test]
    fn test_action_falls_back_to_raw_action() {
        let summaries = vec![sample_incident("1", "low", TS)];
        let mut detail = sample_detail("1", 0);
        let mut alert = sample_alert("1", "A", "");
        alert.action = Some("DETECTED".to_string());
        detail.alerts.push(alert);

        let report = aggregate(&summaries, &details_of(vec![detail]));
        assert_eq!(report.actions.get("DETECTED"), 1);
        assert_eq!(report.total_detected, 0);
    }

    #[test]
    fn test_artifacts() {
        let summaries = vec![sample_incident("1", "low", TS), sample_incident("2", "low", TS)];
        let mut first = sample_detail("1", 1);
        first.network_artifacts = vec![
            sample_network_artifact("198.51.100.1", Some("CN")),
            sample_network_artifact("198.51.100.2", None),
        ];
        first.file_artifacts = vec![
            sample_file_artifact("dropper.exe", Some("malware")),
            sample_file_artifact("notes.txt", None),
        ];
        let mut second = sample_detail("2", 2);
        second.network_artifacts = vec![sample_network_artifact("198.51.100.3", Some("CN"))];

        let report = aggregate(&summaries, &details_of(vec![first, second]));

        assert_eq!(report.alert_count, 3);
        assert_eq!(report.countries.get("CN"), 2);
        assert_eq!(report.countries.total(), 2);
        assert_eq!(report.top_country(), Some(("CN", 2)));
        assert_eq!(report.file_artifact_count, 2);
        assert_eq!(report.file_verdicts.get("malware"), 1);
        assert_eq!(report.file_verdicts.get(UNKNOWN), 1);
    }

    #[test]
    fn test_details_without_summary_are_ignored() {
        let summaries = vec![sample_incident("1", "low", TS)];
        let report = aggregate(
            &summaries,
            &details_of(vec![sample_detail("1", 2), sample_detail("orphan", 5)]),
        );
        assert_eq!(report.alert_count, 2);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let summaries: Vec<_> = (0..40)
            .map(|i| {
                let severity = ["low", "high", "medium"][i % 3];
                with_description(
                    sample_incident(&i.to_string(), severity, TS + (i as i64 % 7) * HOUR),
                    &format!("'Rule {}' generated by XDR", i % 5),
                )
            })
            .collect();
        let details: Vec<_> = (0..40)
            .map(|i| {
                let mut detail = sample_detail(&i.to_string(), i % 4);
                for alert in &mut detail.alerts {
                    alert.action_external_hostname = Some(format!("192.0.2.{}", i % 9));
                }
                detail
            })
            .collect();
        let forward = details_of(details.clone());
        let reversed = details_of(details.into_iter().rev().collect());

        let first = serde_json::to_string(&aggregate(&summaries, &forward)).unwrap();
        let second = serde_json::to_string(&aggregate(&summaries, &reversed)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let report = aggregate(&[], &HashMap::new());
        assert_eq!(report.incident_count, 0);
        assert!(report.hourly.is_empty());
        assert!(report.severity_rows().is_empty());
        assert_eq!(report.incidents_per_hour(24.0), 0.0);
        assert_eq!(report.top_alert_name(), None);
    }
}
