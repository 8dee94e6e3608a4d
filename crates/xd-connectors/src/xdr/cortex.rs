//! Cortex XDR public API connector.
//!
//! Implements [`IncidentSource`] on top of the `incidents/get_incidents` and
//! `incidents/get_incident_extra_data` endpoints.

use crate::http::{HttpClient, RateLimitConfig};
use crate::records::{
    lenient, AlertRecord, FileArtifact, IncidentDetail, IncidentSummary, NetworkArtifact,
};
use crate::traits::{
    Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult, IncidentPage,
    IncidentSource, ListIncidentsRequest,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

const GET_INCIDENTS_PATH: &str = "/public_api/v1/incidents/get_incidents";
const GET_EXTRA_DATA_PATH: &str = "/public_api/v1/incidents/get_incident_extra_data";
const HEALTHCHECK_PATH: &str = "/public_api/v1/healthcheck";

/// Cortex XDR connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexXdrConfig {
    /// Base connector configuration.
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Client-side request budget per minute. `None` disables throttling.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

/// Cortex XDR incidents connector.
pub struct CortexXdrConnector {
    config: CortexXdrConfig,
    client: HttpClient,
}

impl CortexXdrConnector {
    /// Creates a new Cortex XDR connector.
    pub fn new(config: CortexXdrConfig) -> ConnectorResult<Self> {
        if config.connector.base_url.trim().is_empty() {
            return Err(ConnectorError::ConfigError(
                "Cortex XDR base_url is required".to_string(),
            ));
        }

        let rate_limit = config.requests_per_minute.map(|rpm| RateLimitConfig {
            max_requests: rpm.max(1),
            period: Duration::from_secs(60),
            burst_size: rpm.clamp(1, 20),
        });
        let client = HttpClient::with_rate_limit(config.connector.clone(), rate_limit)?;

        info!(
            "Cortex XDR connector initialized for '{}'",
            config.connector.base_url
        );

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Connector for CortexXdrConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn connector_type(&self) -> &str {
        "xdr"
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.client.get(HEALTHCHECK_PATH).await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::AuthenticationFailed(e))
            | Err(ConnectorError::AuthorizationDenied(e)) => Ok(ConnectorHealth::Unhealthy(
                format!("Authentication failed: {}", e),
            )),
            Err(ConnectorError::RateLimited(secs)) => Ok(ConnectorHealth::Degraded(format!(
                "Rate limited for {}s",
                secs
            ))),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let request = ListIncidentsRequest::page(None, 0, 1);
        self.list_incidents(&request).await.map(|_| true)
    }
}

#[async_trait]
impl IncidentSource for CortexXdrConnector {
    #[instrument(skip(self, request), fields(search_from = request.search_from, search_to = request.search_to))]
    async fn list_incidents(
        &self,
        request: &ListIncidentsRequest,
    ) -> ConnectorResult<IncidentPage> {
        let body = RequestEnvelope {
            request_data: request,
        };
        let response: ReplyEnvelope<IncidentsReply> =
            self.client.post_json(GET_INCIDENTS_PATH, &body).await?;

        debug!(
            returned = response.reply.incidents.len(),
            total_count = response.reply.total_count,
            "get_incidents reply"
        );

        Ok(IncidentPage {
            incidents: response.reply.incidents,
            total_count: response.reply.total_count,
        })
    }

    #[instrument(skip(self))]
    async fn get_incident_detail(
        &self,
        incident_id: &str,
        alerts_limit: u32,
    ) -> ConnectorResult<IncidentDetail> {
        let body = RequestEnvelope {
            request_data: ExtraDataRequest {
                incident_id,
                alerts_limit,
            },
        };
        let response: ReplyEnvelope<ExtraDataReply> =
            self.client.post_json(GET_EXTRA_DATA_PATH, &body).await?;

        Ok(response.reply.into_detail(incident_id))
    }
}

#[derive(Debug, Serialize)]
struct RequestEnvelope<T> {
    request_data: T,
}

#[derive(Debug, Serialize)]
struct ExtraDataRequest<'a> {
    incident_id: &'a str,
    alerts_limit: u32,
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope<T> {
    reply: T,
}

#[derive(Debug, Deserialize)]
struct IncidentsReply {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    total_count: u64,
    #[serde(default, deserialize_with = "lenient::list")]
    incidents: Vec<IncidentSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct DataList<T> {
    #[serde(default = "Vec::new", deserialize_with = "lenient::list")]
    data: Vec<T>,
}

impl<T> Default for DataList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct ExtraDataReply {
    #[serde(default)]
    incident: Option<IncidentSummary>,
    #[serde(default)]
    alerts: Option<DataList<AlertRecord>>,
    #[serde(default)]
    network_artifacts: Option<DataList<NetworkArtifact>>,
    #[serde(default)]
    file_artifacts: Option<DataList<FileArtifact>>,
}

impl ExtraDataReply {
    fn into_detail(self, incident_id: &str) -> IncidentDetail {
        IncidentDetail {
            incident_id: incident_id.to_string(),
            incident: self.incident,
            alerts: self.alerts.unwrap_or_default().data,
            network_artifacts: self.network_artifacts.unwrap_or_default().data,
            file_artifacts: self.file_artifacts.unwrap_or_default().data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_connector_config;
    use crate::traits::TimeWindow;
    use serde_json::json;

    #[test]
    fn test_list_request_body_shape() {
        let window = TimeWindow {
            from_ms: 1_000,
            to_ms: 2_000,
        };
        let request = ListIncidentsRequest::page(Some(&window), 100, 100);
        let body = serde_json::to_value(RequestEnvelope {
            request_data: &request,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "request_data": {
                    "filters": [
                        {"field": "creation_time", "operator": "gte", "value": 1000},
                        {"field": "creation_time", "operator": "lte", "value": 2000}
                    ],
                    "search_from": 100,
                    "search_to": 200,
                    "sort": {"field": "creation_time", "keyword": "desc"}
                }
            })
        );
    }

    #[test]
    fn test_extra_data_request_body_shape() {
        let body = serde_json::to_value(RequestEnvelope {
            request_data: ExtraDataRequest {
                incident_id: "812",
                alerts_limit: 50,
            },
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"request_data": {"incident_id": "812", "alerts_limit": 50}})
        );
    }

    #[test]
    fn test_incidents_reply_parsing() {
        let reply: ReplyEnvelope<IncidentsReply> = serde_json::from_value(json!({
            "reply": {
                "total_count": 250,
                "result_count": 1,
                "incidents": [{
                    "incident_id": "901",
                    "severity": "medium",
                    "status": "new",
                    "creation_time": 1_700_000_000_000i64,
                    "description": "'Port Scan' generated by XDR Analytics detected on host 10.1.1.1",
                    "hosts": ["10.1.1.1:abc"],
                    "users": [],
                    "incident_sources": ["XDR Analytics"]
                }]
            }
        }))
        .unwrap();

        assert_eq!(reply.reply.total_count, 250);
        assert_eq!(reply.reply.incidents[0].incident_id, "901");
    }

    #[test]
    fn test_extra_data_reply_into_detail() {
        let reply: ReplyEnvelope<ExtraDataReply> = serde_json::from_value(json!({
            "reply": {
                "incident": {"incident_id": "901", "severity": "high"},
                "alerts": {"total_count": 1, "data": [{
                    "alert_id": 5,
                    "name": "Port Scan",
                    "action_pretty": "Detected (Reported)",
                    "action_external_hostname": "203.0.113.7"
                }]},
                "network_artifacts": {"total_count": 0, "data": []},
                "file_artifacts": null
            }
        }))
        .unwrap();

        let detail = reply.reply.into_detail("901");
        assert_eq!(detail.incident_id, "901");
        assert_eq!(detail.alerts.len(), 1);
        assert_eq!(detail.alerts[0].alert_id.as_deref(), Some("5"));
        assert!(detail.network_artifacts.is_empty());
        assert!(detail.file_artifacts.is_empty());
    }

    #[test]
    fn test_incidents_reply_tolerates_shape_errors() {
        let reply: ReplyEnvelope<IncidentsReply> = serde_json::from_value(json!({
            "reply": {
                "total_count": "2",
                "incidents": [
                    {"incident_id": "1", "rule_based_score": "50", "starred": "false"},
                    {"incident_id": "2", "manual_score": null}
                ]
            }
        }))
        .unwrap();
        assert_eq!(reply.reply.total_count, 2);
        assert_eq!(reply.reply.incidents.len(), 2);
        assert_eq!(reply.reply.incidents[0].rule_based_score, Some(50.0));

        let reply: ReplyEnvelope<IncidentsReply> = serde_json::from_value(json!({
            "reply": {"total_count": null, "incidents": null}
        }))
        .unwrap();
        assert_eq!(reply.reply.total_count, 0);
        assert!(reply.reply.incidents.is_empty());
    }

    #[test]
    fn test_extra_data_reply_tolerates_null_data() {
        let reply: ReplyEnvelope<ExtraDataReply> = serde_json::from_value(json!({
            "reply": {
                "incident": {"incident_id": "77", "rule_based_score": "10"},
                "alerts": {"total_count": 0, "data": null},
                "network_artifacts": {"data": [{"network_country": "DE"}]},
                "file_artifacts": {}
            }
        }))
        .unwrap();

        let detail = reply.reply.into_detail("77");
        assert!(detail.alerts.is_empty());
        assert_eq!(detail.network_artifacts.len(), 1);
        assert!(detail.file_artifacts.is_empty());
        assert_eq!(
            detail.incident.and_then(|i| i.rule_based_score),
            Some(10.0)
        );
    }

    #[test]
    fn test_connector_requires_base_url() {
        let config = CortexXdrConfig {
            connector: test_connector_config("xdr", ""),
            requests_per_minute: None,
        };
        assert!(matches!(
            CortexXdrConnector::new(config),
            Err(ConnectorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_connector_metadata() {
        let config = CortexXdrConfig {
            connector: test_connector_config("tenant-a", "https://api-tenant-a.xdr.eu.paloaltonetworks.com"),
            requests_per_minute: Some(120),
        };
        let connector = CortexXdrConnector::new(config).unwrap();
        assert_eq!(connector.name(), "tenant-a");
        assert_eq!(connector.connector_type(), "xdr");
    }
}
