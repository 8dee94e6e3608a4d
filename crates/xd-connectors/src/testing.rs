//! Testing harness for incident sources and the pipeline.
//!
//! Builders for realistic incident records, so tests only spell out the
//! fields they care about.

use crate::records::{AlertRecord, FileArtifact, IncidentDetail, IncidentSummary, NetworkArtifact};
use crate::traits::{AuthConfig, ConnectorConfig};
use std::collections::HashMap;

/// Creates a test connector config with sensible defaults.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 30,
        max_retries: 0,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// Creates an incident summary with the given id, severity and creation time.
pub fn sample_incident(id: &str, severity: &str, creation_time: i64) -> IncidentSummary {
    IncidentSummary {
        incident_id: id.to_string(),
        severity: Some(severity.to_string()),
        status: Some("new".to_string()),
        creation_time: Some(creation_time),
        modification_time: Some(creation_time),
        hosts: vec![format!("host-{}", id)],
        users: Vec::new(),
        incident_sources: vec!["XDR Agent".to_string()],
        alert_count: 1,
        high_severity_alert_count: u32::from(severity == "high" || severity == "critical"),
        description: Some(format!(
            "'Sample Alert' generated by XDR Agent detected on host host-{}",
            id
        )),
        ..Default::default()
    }
}

/// Creates an alert with the given name and `action_pretty`.
pub fn sample_alert(alert_id: &str, name: &str, action_pretty: &str) -> AlertRecord {
    AlertRecord {
        alert_id: Some(alert_id.to_string()),
        name: Some(name.to_string()),
        category: Some("Malware".to_string()),
        severity: Some("medium".to_string()),
        action: Some("BLOCKED".to_string()),
        action_pretty: Some(action_pretty.to_string()),
        detection_timestamp: Some(1_700_000_000_000),
        host_name: Some("ws-01".to_string()),
        host_ip: Some("10.0.0.10".to_string()),
        ..Default::default()
    }
}

/// Creates a network artifact for a remote IP.
pub fn sample_network_artifact(ip: &str, country: Option<&str>) -> NetworkArtifact {
    NetworkArtifact {
        artifact_type: Some("IP".to_string()),
        remote_ip: Some(ip.to_string()),
        domain: None,
        country: country.map(str::to_string),
        remote_port: Some(443),
    }
}

/// Creates a file artifact with the given verdict.
pub fn sample_file_artifact(name: &str, verdict: Option<&str>) -> FileArtifact {
    FileArtifact {
        artifact_type: Some("HASH".to_string()),
        file_name: Some(name.to_string()),
        sha256: Some(format!("{:0>64}", name.len())),
        wildfire_verdict: verdict.map(str::to_string),
    }
}

/// Creates a detail record with `alerts` blocked alerts and no artifacts.
pub fn sample_detail(incident_id: &str, alerts: usize) -> IncidentDetail {
    IncidentDetail {
        incident_id: incident_id.to_string(),
        incident: None,
        alerts: (0..alerts)
            .map(|i| {
                sample_alert(
                    &format!("{}-{}", incident_id, i),
                    "Sample Alert",
                    "Prevented (Blocked)",
                )
            })
            .collect(),
        network_artifacts: Vec::new(),
        file_artifacts: Vec::new(),
    }
}
