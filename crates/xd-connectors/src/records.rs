//! Incident, alert and artifact schemas as returned by the incidents API.
//!
//! Every field except the incident id is optional on the wire. Decoding is
//! lenient: ids and ports may be numbers or strings, lists may be `null`, and
//! a missing value becomes `None` or an empty list instead of an error.

use serde::{Deserialize, Serialize};

/// One row of a `get_incidents` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentSummary {
    #[serde(default, deserialize_with = "lenient::string")]
    pub incident_id: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    /// Epoch milliseconds, UTC.
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub creation_time: Option<i64>,
    /// Epoch milliseconds, UTC.
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub modification_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub hosts: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub users: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub incident_sources: Vec<String>,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub alert_count: u32,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub high_severity_alert_count: u32,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub assigned_user_mail: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rule_based_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub manual_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub starred: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub xdr_url: Option<String>,
}

/// Alerts and artifacts for one incident, keyed by `incident_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentDetail {
    pub incident_id: String,
    /// The incident header echoed back by the detail call.
    pub incident: Option<IncidentSummary>,
    pub alerts: Vec<AlertRecord>,
    pub network_artifacts: Vec<NetworkArtifact>,
    pub file_artifacts: Vec<FileArtifact>,
}

/// A single detection event inside an incident.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub alert_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_pretty: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub detection_timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub host_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub host_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub user_name: Option<String>,
    #[serde(
        default,
        rename = "mitre_tactic_id_and_name",
        deserialize_with = "lenient::opt_string"
    )]
    pub mitre_tactic: Option<String>,
    #[serde(
        default,
        rename = "mitre_technique_id_and_name",
        deserialize_with = "lenient::opt_string"
    )]
    pub mitre_technique: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_process_image_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_process_image_command_line: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_process_image_sha256: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub actor_process_image_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub actor_process_command_line: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_external_hostname: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_remote_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub action_remote_port: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_local_ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub action_local_port: Option<u32>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_file_path: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub action_file_sha256: Option<String>,
}

impl AlertRecord {
    /// `action_pretty`, falling back to `action`. Empty strings count as absent.
    pub fn action_label(&self) -> Option<&str> {
        non_empty(self.action_pretty.as_deref()).or_else(|| non_empty(self.action.as_deref()))
    }
}

/// A remote IP or domain observed in an incident.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkArtifact {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    pub artifact_type: Option<String>,
    #[serde(
        default,
        rename = "network_remote_ip",
        deserialize_with = "lenient::opt_string"
    )]
    pub remote_ip: Option<String>,
    #[serde(
        default,
        rename = "network_domain",
        deserialize_with = "lenient::opt_string"
    )]
    pub domain: Option<String>,
    #[serde(
        default,
        rename = "network_country",
        deserialize_with = "lenient::opt_string"
    )]
    pub country: Option<String>,
    #[serde(
        default,
        rename = "network_remote_port",
        deserialize_with = "lenient::opt_u32"
    )]
    pub remote_port: Option<u32>,
}

impl NetworkArtifact {
    /// The remote IP if present, otherwise the domain.
    pub fn value(&self) -> Option<&str> {
        non_empty(self.remote_ip.as_deref()).or_else(|| non_empty(self.domain.as_deref()))
    }
}

/// A file hash observed in an incident.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileArtifact {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string")]
    pub artifact_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub file_name: Option<String>,
    #[serde(
        default,
        rename = "file_sha256",
        deserialize_with = "lenient::opt_string"
    )]
    pub sha256: Option<String>,
    #[serde(
        default,
        rename = "file_wildfire_verdict",
        deserialize_with = "lenient::opt_string"
    )]
    pub wildfire_verdict: Option<String>,
}

/// Treats `Some("")` like `None`.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub(crate) mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(items) => {
                let parts: Vec<String> = items.into_iter().filter_map(scalar_to_string).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(", "))
                }
            }
            other => Some(other.to_string()),
        }
    }

    fn to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(to_i64(&Value::deserialize(d)?))
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(to_i64(&Value::deserialize(d)?).and_then(|n| u32::try_from(n).ok()))
    }

    pub fn u32_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        opt_u32(d).map(Option::unwrap_or_default)
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn u64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(to_i64(&Value::deserialize(d)?)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or_default())
    }

    /// A list of records. `null` or a non-array is empty; elements that do
    /// not decode are skipped.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let items = match Value::deserialize(d)? {
            Value::Array(items) => items,
            _ => return Ok(Vec::new()),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping record that failed to decode");
                    None
                }
            })
            .collect())
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
            other => scalar_to_string(other).into_iter().collect(),
        })
    }
}
