//! Text rendering of run reports and single incidents.

use colored::Colorize;
use std::io::{self, Write};
use xd_connectors::records::non_empty;
use xd_connectors::{IncidentDetail, IncidentSummary};
use xd_core::{format_epoch_ms, is_blocked, Histogram, RiskLevel, RunOutput, Severity};

const RULE_WIDTH: usize = 100;
const NA: &str = "N/A";

fn or_na(value: Option<&str>) -> &str {
    non_empty(value).unwrap_or(NA)
}

fn join_or_na(values: &[String]) -> String {
    if values.is_empty() {
        NA.to_string()
    } else {
        values.join(", ")
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max).collect();
        format!("{}...", head)
    }
}

fn section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{}", title.bold())?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

fn subsection<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "--- {} ---", title)
}

fn counted_list<W: Write>(out: &mut W, entries: &[(&str, u64)], prefix: &str) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "  None");
    }
    for (key, count) in entries {
        writeln!(out, "  {:>5}x  {}{}", count, prefix, key)?;
    }
    Ok(())
}

fn labeled_list<W: Write>(out: &mut W, histogram: &Histogram, width: usize) -> io::Result<()> {
    if histogram.is_empty() {
        return writeln!(out, "  None");
    }
    for (key, count) in histogram.ranked() {
        writeln!(out, "  {:<width$}: {:>5}", key, count, width = width)?;
    }
    Ok(())
}

fn top_or_na(entry: Option<(&str, u64)>) -> String {
    match entry {
        Some((key, count)) => format!("{} ({}x)", key, count),
        None => format!("{} (0x)", NA),
    }
}

/// Renders the full run report.
pub fn render_report<W: Write>(out: &mut W, output: &RunOutput) -> io::Result<()> {
    let report = &output.report;
    let agg = &report.aggregate;

    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{}", "CORTEX XDR INCIDENT DIGEST".bold())?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    if let Some(window) = &report.window {
        writeln!(
            out,
            "Window   : {} -> {}",
            format_epoch_ms(Some(window.from_ms)),
            format_epoch_ms(Some(window.to_ms))
        )?;
    }
    writeln!(
        out,
        "Retrieved {} of {} matching incidents",
        report.retrieved, report.total_count
    )?;

    if report.retrieved == 0 {
        writeln!(out)?;
        writeln!(out, "  No incidents in the selected window.")?;
        return Ok(());
    }

    section(out, "INCIDENT OVERVIEW")?;
    writeln!(out)?;
    writeln!(out, "  Total Incidents      : {}", agg.incident_count)?;
    writeln!(out, "  Total Alerts         : {}", agg.alert_count)?;
    writeln!(out, "  Unique Hosts/IPs     : {}", agg.unique_hosts)?;
    writeln!(
        out,
        "  Time Range           : {} -> {}",
        format_epoch_ms(agg.oldest_creation_time),
        format_epoch_ms(agg.newest_creation_time)
    )?;
    writeln!(
        out,
        "  Avg Incidents/Hour   : {:.1}",
        report.incidents_per_hour
    )?;
    if report.detail_failures > 0 {
        writeln!(
            out,
            "  Detail Fetches       : {} OK, {} failed",
            report.details_fetched,
            report.detail_failures.to_string().yellow()
        )?;
    }

    subsection(out, "Severity")?;
    for row in agg.severity_rows() {
        let bar = "#".repeat((row.percent / 2.0) as usize);
        writeln!(
            out,
            "  {:<14}: {:>5} ({:5.1}%)  {}",
            row.severity, row.count, row.percent, bar
        )?;
    }

    subsection(out, "Status")?;
    for (status, count) in agg.status.ranked() {
        writeln!(
            out,
            "  {:<35}: {:>5} ({:5.1}%)",
            status,
            count,
            agg.status.percent(status)
        )?;
    }

    subsection(out, "Incident Sources")?;
    labeled_list(out, &agg.sources, 30)?;

    section(out, "HOURLY DISTRIBUTION")?;
    writeln!(out)?;
    writeln!(
        out,
        "  {:<20} {:>6} {:>6} {:>6} | Top Alert",
        "Hour", "Total", "High", "Med"
    )?;
    writeln!(
        out,
        "  {} {} {} {} + {}",
        "-".repeat(20),
        "-".repeat(6),
        "-".repeat(6),
        "-".repeat(6),
        "-".repeat(40)
    )?;
    for (hour, bucket) in &agg.hourly {
        let (top_alert, top_count) = bucket.top_alert().unwrap_or((NA, 0));
        writeln!(
            out,
            "  {:<20} {:>6} {:>6} {:>6} | {} ({}x)  {}",
            hour,
            bucket.total,
            bucket.high_or_critical(),
            bucket.severity.get(Severity::Medium.as_str()),
            truncate(top_alert, 35),
            top_count,
            "|".repeat((bucket.total as usize).min(60))
        )?;
    }

    section(out, "TOP ALERT TYPES")?;
    writeln!(out)?;
    for (name, count) in agg.alert_names.top(25) {
        writeln!(
            out,
            "  {:>5}x ({:5.1}%)  {}",
            count,
            agg.alert_names.percent(name),
            name
        )?;
    }

    render_alert_analysis(out, output)?;
    render_network(out, output)?;
    render_files(out, output)?;
    render_high_critical(out, &output.incidents, &agg.high_critical_incident_ids)?;
    render_summary(out, output)
}

fn render_alert_analysis<W: Write>(out: &mut W, output: &RunOutput) -> io::Result<()> {
    let agg = &output.report.aggregate;

    section(out, "DETAILED ALERT ANALYSIS")?;
    writeln!(out)?;
    writeln!(out, "  Total alerts: {}", agg.alert_count)?;

    subsection(out, "Alert Actions")?;
    for (action, count) in agg.actions.ranked() {
        let tag = if is_blocked(action) {
            format!("[{:>7}]", "BLOCKED").green()
        } else {
            format!("[{:>7}]", "DETECT").yellow()
        };
        writeln!(out, "  {} {:>5}x  {}", tag, count, action)?;
    }

    if !agg.unblocked_alerts.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "  {}",
            format!(
                "*** WARNING: {} alerts were DETECTED but NOT BLOCKED ***",
                agg.unblocked_alerts.len()
            )
            .red()
            .bold()
        )?;
        writeln!(out, "  These require immediate investigation:")?;
        for alert in &agg.unblocked_alerts {
            writeln!(
                out,
                "    - Alert {}: {}",
                or_na(alert.alert_id.as_deref()),
                or_na(alert.name.as_deref())
            )?;
            writeln!(
                out,
                "      Host: {} | Action: {} | Severity: {}",
                or_na(alert.host_ip.as_deref()),
                alert.action,
                or_na(alert.severity.as_deref())
            )?;
            writeln!(
                out,
                "      Time: {}",
                format_epoch_ms(alert.detection_timestamp)
            )?;
            if let Some(process) = non_empty(alert.process_image_name.as_deref()) {
                writeln!(
                    out,
                    "      Process: {} | CMD: {}",
                    process,
                    or_na(alert.process_command_line.as_deref())
                )?;
            }
            if let Some(actor) = non_empty(alert.actor_image_name.as_deref()) {
                writeln!(
                    out,
                    "      Actor: {} | CMD: {}",
                    actor,
                    or_na(alert.actor_command_line.as_deref())
                )?;
            }
            if let Some(path) = non_empty(alert.file_path.as_deref()) {
                writeln!(out, "      File: {}", path)?;
            }
            if let Some(sha) = non_empty(alert.file_sha256.as_deref()) {
                writeln!(out, "      SHA256: {}", sha)?;
            }
        }
    }

    subsection(out, "Alert Categories")?;
    labeled_list(out, &agg.categories, 45)?;

    subsection(out, "MITRE ATT&CK Tactics")?;
    if agg.mitre_tactics.is_empty() {
        writeln!(out, "  None mapped")?;
    } else {
        counted_list(out, &agg.mitre_tactics.ranked(), "")?;
    }

    if !agg.mitre_techniques.is_empty() {
        subsection(out, "MITRE ATT&CK Techniques")?;
        counted_list(out, &agg.mitre_techniques.ranked(), "")?;
    }
    Ok(())
}

fn render_network<W: Write>(out: &mut W, output: &RunOutput) -> io::Result<()> {
    let agg = &output.report.aggregate;

    section(out, "NETWORK ANALYSIS")?;

    subsection(out, "Top 30 External Hostnames (Attackers)")?;
    counted_list(out, &agg.external_hostnames.top(30), "")?;

    subsection(out, "Top 30 Remote IPs (Targets)")?;
    counted_list(out, &agg.remote_ips.top(30), "")?;

    subsection(out, "Top 20 Local IPs")?;
    counted_list(out, &agg.local_ips.top(20), "")?;

    subsection(out, "Target Ports")?;
    counted_list(out, &agg.remote_ports.top(15), "port ")?;

    subsection(out, "Source Countries")?;
    if agg.countries.is_empty() {
        writeln!(out, "  None")?;
    }
    for (country, count) in agg.countries.ranked() {
        writeln!(
            out,
            "  {:<6}: {:>5} ({:5.1}%)",
            country,
            count,
            agg.countries.percent(country)
        )?;
    }

    subsection(out, "Attacker Subnet Analysis (/24)")?;
    counted_list(out, &agg.subnets.top(15), "")
}

fn render_files<W: Write>(out: &mut W, output: &RunOutput) -> io::Result<()> {
    let agg = &output.report.aggregate;

    section(out, "FILE ARTIFACTS")?;
    if agg.file_artifacts.is_empty() {
        writeln!(out)?;
        return writeln!(out, "  No file artifacts found.");
    }

    writeln!(out)?;
    writeln!(out, "  Total file artifacts: {}", agg.file_artifact_count)?;

    subsection(out, "Wildfire Verdicts")?;
    labeled_list(out, &agg.file_verdicts, 20)?;

    subsection(out, "File Details")?;
    for artifact in &agg.file_artifacts {
        let sha = match non_empty(artifact.sha256.as_deref()) {
            Some(sha) => truncate(sha, 40),
            None => NA.to_string(),
        };
        writeln!(
            out,
            "  {:<30} | {:<12} | {}",
            or_na(artifact.file_name.as_deref()),
            or_na(artifact.wildfire_verdict.as_deref()),
            sha
        )?;
    }
    Ok(())
}

fn render_high_critical<W: Write>(
    out: &mut W,
    incidents: &[IncidentSummary],
    ids: &[String],
) -> io::Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    section(out, &format!("HIGH/CRITICAL SEVERITY INCIDENTS ({})", ids.len()))?;
    for incident in incidents.iter().filter(|i| ids.contains(&i.incident_id)) {
        writeln!(out)?;
        writeln!(
            out,
            "  ID: {} | Severity: {} | Status: {}",
            incident.incident_id,
            or_na(incident.severity.as_deref()).red(),
            or_na(incident.status.as_deref())
        )?;
        writeln!(out, "  Created : {}", format_epoch_ms(incident.creation_time))?;
        writeln!(out, "  Desc    : {}", or_na(incident.description.as_deref()))?;
        writeln!(out, "  Hosts   : {}", join_or_na(&incident.hosts))?;
        writeln!(out, "  Source  : {}", incident.incident_sources.join(", "))?;
        writeln!(
            out,
            "  Alerts  : {} (High: {})",
            incident.alert_count, incident.high_severity_alert_count
        )?;
        writeln!(out, "  XDR URL : {}", or_na(incident.xdr_url.as_deref()))?;
    }
    Ok(())
}

fn render_summary<W: Write>(out: &mut W, output: &RunOutput) -> io::Result<()> {
    let report = &output.report;
    let agg = &report.aggregate;

    section(out, "EXECUTIVE SUMMARY")?;
    writeln!(out)?;
    let period = match report.window {
        Some(_) => format!("Last {:.0} hours", report.window_hours),
        None => format!("{:.0} hours observed", report.window_hours),
    };
    writeln!(out, "  Time Period            : {}", period)?;
    writeln!(out, "  Total Incidents        : {}", agg.incident_count)?;
    writeln!(out, "  Total Alerts           : {}", agg.alert_count)?;
    writeln!(out, "  Avg Incidents/Hour     : {:.1}", report.incidents_per_hour)?;
    writeln!(out, "  Blocked Alerts         : {}", agg.total_blocked)?;
    writeln!(out, "  Detected (not blocked) : {}", agg.total_detected)?;
    writeln!(
        out,
        "  High/Critical          : {} ({:.1}%)",
        agg.high_critical_count(),
        agg.high_critical_percent()
    )?;
    writeln!(out, "  Unique Hosts           : {}", agg.unique_hosts)?;
    writeln!(out, "  File Artifacts         : {}", agg.file_artifact_count)?;
    writeln!(out, "  Top Threat             : {}", top_or_na(agg.top_alert_name()))?;
    writeln!(out, "  Top Source Country     : {}", top_or_na(agg.top_country()))?;
    writeln!(out, "  Top Attacker Subnet    : {}", top_or_na(agg.top_subnet()))?;

    writeln!(out)?;
    writeln!(out, "  {}", "RISK ASSESSMENT:".bold())?;
    if report.risk_flags.is_empty() {
        writeln!(out, "  {}", "No risk flags raised".green())?;
    }
    for flag in &report.risk_flags {
        let line = match flag.level {
            RiskLevel::Critical => format!("[!!!] CRITICAL: {}", flag.message).red().bold(),
            RiskLevel::High => format!("[!!]  HIGH: {}", flag.message).red(),
            RiskLevel::Elevated => format!("[!]   ELEVATED: {}", flag.message).yellow(),
        };
        writeln!(out, "  {}", line)?;
    }
    writeln!(out)
}

/// Renders one incident with its alerts and artifacts.
pub fn render_incident_detail<W: Write>(out: &mut W, detail: &IncidentDetail) -> io::Result<()> {
    let summary = detail.incident.clone().unwrap_or_default();

    writeln!(out, "  Incident ID       : {}", detail.incident_id)?;
    writeln!(out, "  Description       : {}", or_na(summary.description.as_deref()))?;
    writeln!(out, "  Severity          : {}", or_na(summary.severity.as_deref()))?;
    writeln!(out, "  Status            : {}", or_na(summary.status.as_deref()))?;
    writeln!(out, "  Created           : {}", format_epoch_ms(summary.creation_time))?;
    writeln!(out, "  Modified          : {}", format_epoch_ms(summary.modification_time))?;
    writeln!(
        out,
        "  Assigned To       : {}",
        non_empty(summary.assigned_user_mail.as_deref()).unwrap_or("Unassigned")
    )?;
    writeln!(out, "  Alert Count       : {}", summary.alert_count)?;
    writeln!(
        out,
        "  High Severity Alert Count : {}",
        summary.high_severity_alert_count
    )?;
    writeln!(out, "  Hosts             : {}", join_or_na(&summary.hosts))?;
    writeln!(out, "  Users             : {}", join_or_na(&summary.users))?;
    writeln!(out, "  Incident Sources  : {}", join_or_na(&summary.incident_sources))?;
    writeln!(
        out,
        "  Rule Based Score  : {}",
        summary.rule_based_score.map_or(NA.to_string(), |s| s.to_string())
    )?;
    writeln!(
        out,
        "  Manual Score      : {}",
        summary.manual_score.map_or(NA.to_string(), |s| s.to_string())
    )?;
    writeln!(
        out,
        "  Starred           : {}",
        summary.starred.map_or(NA.to_string(), |s| s.to_string())
    )?;
    writeln!(out, "  XDR URL           : {}", or_na(summary.xdr_url.as_deref()))?;

    if !detail.alerts.is_empty() {
        writeln!(out)?;
        writeln!(out, "  --- Alerts ({}) ---", detail.alerts.len())?;
    }
    for (i, alert) in detail.alerts.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "  Alert #{}:", i + 1)?;
        let fields = [
            ("Alert ID", alert.alert_id.as_deref()),
            ("Name", alert.name.as_deref()),
            ("Category", alert.category.as_deref()),
            ("Severity", alert.severity.as_deref()),
            ("Source", alert.source.as_deref()),
            ("Action", alert.action.as_deref()),
            ("Action Pretty", alert.action_pretty.as_deref()),
        ];
        for (label, value) in fields {
            writeln!(out, "    {:<16}: {}", label, or_na(value))?;
        }
        writeln!(
            out,
            "    {:<16}: {}",
            "Detection Time",
            format_epoch_ms(alert.detection_timestamp)
        )?;
        let fields = [
            ("Host Name", alert.host_name.as_deref()),
            ("Host IP", alert.host_ip.as_deref()),
            ("User Name", alert.user_name.as_deref()),
            ("MITRE Tactic", alert.mitre_tactic.as_deref()),
            ("MITRE Technique", alert.mitre_technique.as_deref()),
            ("Description", alert.description.as_deref()),
        ];
        for (label, value) in fields {
            writeln!(out, "    {:<16}: {}", label, or_na(value))?;
        }

        if let Some(process) = non_empty(alert.action_process_image_name.as_deref()) {
            writeln!(out, "    {:<16}: {}", "Process Name", process)?;
            writeln!(
                out,
                "    {:<16}: {}",
                "Process CMD",
                or_na(alert.action_process_image_command_line.as_deref())
            )?;
            writeln!(
                out,
                "    {:<16}: {}",
                "Process SHA256",
                or_na(alert.action_process_image_sha256.as_deref())
            )?;
        }
        if let Some(actor) = non_empty(alert.actor_process_image_name.as_deref()) {
            writeln!(out, "    {:<16}: {}", "Actor Process", actor)?;
            writeln!(
                out,
                "    {:<16}: {}",
                "Actor CMD",
                or_na(alert.actor_process_command_line.as_deref())
            )?;
        }
        if let Some(host) = non_empty(alert.action_external_hostname.as_deref()) {
            writeln!(out, "    {:<16}: {}", "Ext Hostname", host)?;
        }
        if let Some(ip) = non_empty(alert.action_remote_ip.as_deref()) {
            writeln!(out, "    {:<16}: {}", "Remote IP", ip)?;
            writeln!(
                out,
                "    {:<16}: {}",
                "Remote Port",
                alert.action_remote_port.map_or(NA.to_string(), |p| p.to_string())
            )?;
        }
        if let Some(ip) = non_empty(alert.action_local_ip.as_deref()) {
            writeln!(out, "    {:<16}: {}", "Local IP", ip)?;
            writeln!(
                out,
                "    {:<16}: {}",
                "Local Port",
                alert.action_local_port.map_or(NA.to_string(), |p| p.to_string())
            )?;
        }
    }

    if !detail.network_artifacts.is_empty() {
        writeln!(out)?;
        writeln!(out, "  --- Network Artifacts ({}) ---", detail.network_artifacts.len())?;
        for (i, artifact) in detail.network_artifacts.iter().enumerate() {
            writeln!(
                out,
                "    [{}] Type: {} | Value: {} | Country: {} | Port: {}",
                i + 1,
                or_na(artifact.artifact_type.as_deref()),
                artifact.value().unwrap_or(NA),
                or_na(artifact.country.as_deref()),
                artifact.remote_port.map_or(NA.to_string(), |p| p.to_string())
            )?;
        }
    }

    if !detail.file_artifacts.is_empty() {
        writeln!(out)?;
        writeln!(out, "  --- File Artifacts ({}) ---", detail.file_artifacts.len())?;
        for (i, artifact) in detail.file_artifacts.iter().enumerate() {
            writeln!(
                out,
                "    [{}] Name: {} | SHA256: {} | Wildfire: {} | Type: {}",
                i + 1,
                or_na(artifact.file_name.as_deref()),
                or_na(artifact.sha256.as_deref()),
                or_na(artifact.wildfire_verdict.as_deref()),
                or_na(artifact.artifact_type.as_deref())
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xd_connectors::testing::{sample_alert, sample_detail, sample_file_artifact, sample_incident};
    use xd_connectors::MockIncidentSource;
    use xd_core::{Pipeline, RunOptions};

    const TS: i64 = 1_700_000_000_000;

    async fn run(incidents: Vec<IncidentSummary>, details: Vec<IncidentDetail>) -> RunOutput {
        let source = Arc::new(MockIncidentSource::with_data("mock", incidents, details));
        Pipeline::new(source)
            .run(RunOptions::default())
            .await
            .unwrap()
    }

    fn render(output: &RunOutput) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        render_report(&mut buf, output).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_report_sections() {
        let mut detail = sample_detail("1", 1);
        detail
            .alerts
            .push(sample_alert("1-x", "Lateral Movement", "Detected (Reported)"));
        detail.file_artifacts = vec![sample_file_artifact("payload.dll", Some("malware"))];
        let output = run(
            vec![sample_incident("1", "critical", TS), sample_incident("2", "low", TS + 1)],
            vec![detail, sample_detail("2", 1)],
        )
        .await;

        let text = render(&output);
        for heading in [
            "INCIDENT OVERVIEW",
            "HOURLY DISTRIBUTION",
            "TOP ALERT TYPES",
            "DETAILED ALERT ANALYSIS",
            "NETWORK ANALYSIS",
            "FILE ARTIFACTS",
            "HIGH/CRITICAL SEVERITY INCIDENTS (1)",
            "EXECUTIVE SUMMARY",
        ] {
            assert!(text.contains(heading), "missing section {}", heading);
        }
        assert!(text.contains("1 alerts were DETECTED but NOT BLOCKED"));
        assert!(text.contains("[!!!] CRITICAL"));
        assert!(text.contains("[!]   ELEVATED"));
        assert!(text.contains("payload.dll"));
        assert!(text.contains("2023-11-14 22:00"));
    }

    #[tokio::test]
    async fn test_empty_report() {
        let output = run(vec![], vec![]).await;
        let text = render(&output);
        assert!(text.contains("No incidents in the selected window."));
        assert!(!text.contains("EXECUTIVE SUMMARY"));
    }

    #[test]
    fn test_incident_detail() {
        colored::control::set_override(false);
        let mut detail = sample_detail("812", 2);
        detail.incident = Some(sample_incident("812", "high", TS));

        let mut buf = Vec::new();
        render_incident_detail(&mut buf, &detail).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("Incident ID       : 812"));
        assert!(text.contains("Created           : 2023-11-14 22:13:20 UTC"));
        assert!(text.contains("Assigned To       : Unassigned"));
        assert!(text.contains("--- Alerts (2) ---"));
        assert!(text.contains("Alert #2:"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }
}
