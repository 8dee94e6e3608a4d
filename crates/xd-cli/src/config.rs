//! Configuration loading for the xdr-digest CLI.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use xd_connectors::{AuthConfig, ConnectorConfig, CortexXdrConfig, SecureString};
use xd_core::{CollectorConfig, DetailConfig};

const REDACTED: &str = "***REDACTED***";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cortex XDR tenant connection.
    #[serde(default)]
    pub xdr: XdrConfig,

    /// Paging and detail fan-out.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Report output.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `XDR_API_URL`, `XDR_API_KEY_ID`, `XDR_API_KEY` and
    /// `XDR_AUTH_TYPE` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("XDR_API_URL") {
            self.xdr.api_url = url;
        }
        if let Some(key_id) = get("XDR_API_KEY_ID") {
            self.xdr.api_key_id = key_id;
        }
        if let Some(key) = get("XDR_API_KEY") {
            self.xdr.api_key = SecureString::from(key);
        }
        if let Some(auth_type) = get("XDR_AUTH_TYPE") {
            self.xdr.auth_type = auth_type.to_lowercase();
        }
    }

    /// Creates a copy with secrets redacted.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        if !config.xdr.api_key.is_empty() {
            config.xdr.api_key = SecureString::from(REDACTED);
        }
        config
    }
}

/// Cortex XDR tenant connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XdrConfig {
    /// Connector name used in logs.
    #[serde(default = "default_connector_name")]
    pub name: String,

    /// Tenant API URL, e.g. `https://api-acme.xdr.us.paloaltonetworks.com`.
    #[serde(default)]
    pub api_url: String,

    /// API key id (`x-xdr-auth-id`).
    #[serde(default)]
    pub api_key_id: String,

    /// API key.
    #[serde(default)]
    pub api_key: SecureString,

    /// `standard` or `advanced`.
    #[serde(default = "default_auth_type")]
    pub auth_type: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Transport-level retries.
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Client-side request budget.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

fn default_connector_name() -> String {
    "cortex-xdr".to_string()
}

fn default_auth_type() -> String {
    "standard".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for XdrConfig {
    fn default() -> Self {
        Self {
            name: default_connector_name(),
            api_url: String::new(),
            api_key_id: String::new(),
            api_key: SecureString::default(),
            auth_type: default_auth_type(),
            timeout_secs: default_timeout(),
            max_retries: 0,
            verify_tls: true,
            requests_per_minute: None,
        }
    }
}

impl XdrConfig {
    pub fn has_credentials(&self) -> bool {
        !self.api_key_id.is_empty() && !self.api_key.is_empty()
    }

    /// Builds the authentication settings. Missing credentials mean no auth.
    pub fn auth(&self) -> Result<AuthConfig> {
        if !self.has_credentials() {
            return Ok(AuthConfig::None);
        }
        let key_id = self.api_key_id.clone();
        let key = self.api_key.clone();
        match self.auth_type.as_str() {
            "standard" => Ok(AuthConfig::XdrStandard { key_id, key }),
            "advanced" => Ok(AuthConfig::XdrAdvanced { key_id, key }),
            other => bail!(
                "Unknown auth_type '{}': expected 'standard' or 'advanced'",
                other
            ),
        }
    }

    /// Builds the connector configuration.
    pub fn connector_config(&self) -> Result<CortexXdrConfig> {
        Ok(CortexXdrConfig {
            connector: ConnectorConfig {
                name: self.name.clone(),
                base_url: self.api_url.trim_end_matches('/').to_string(),
                auth: self.auth()?,
                timeout_secs: self.timeout_secs,
                max_retries: self.max_retries,
                verify_tls: self.verify_tls,
                headers: HashMap::new(),
            },
            requests_per_minute: self.requests_per_minute,
        })
    }
}

/// Paging and detail fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Look-back window in hours. `None` reads the newest incidents.
    #[serde(default = "default_hours")]
    pub hours: Option<u32>,

    /// Maximum incidents to analyze.
    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_alerts_limit")]
    pub alerts_limit: u32,

    /// Maximum detail requests in flight.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_detail_timeout")]
    pub detail_timeout_secs: u64,
}

fn default_hours() -> Option<u32> {
    Some(24)
}

fn default_page_size() -> usize {
    100
}

fn default_alerts_limit() -> u32 {
    50
}

fn default_max_concurrent() -> usize {
    8
}

fn default_detail_timeout() -> u64 {
    60
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            hours: default_hours(),
            limit: None,
            page_size: default_page_size(),
            alerts_limit: default_alerts_limit(),
            max_concurrent: default_max_concurrent(),
            detail_timeout_secs: default_detail_timeout(),
        }
    }
}

impl CollectionConfig {
    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            page_size: self.page_size,
            limit: self.limit,
        }
    }

    pub fn detail(&self) -> DetailConfig {
        DetailConfig {
            alerts_limit: self.alerts_limit,
            max_concurrent: self.max_concurrent,
            request_timeout_secs: self.detail_timeout_secs,
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for `incidents_raw.json`, `incidents_detailed.json` and
    /// `report.json`. Nothing is written when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format.
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}
