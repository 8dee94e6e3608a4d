//! Health command - checks tenant reachability and credentials.

use anyhow::Result;
use colored::Colorize;
use xd_connectors::{Connector, ConnectorHealth};

use super::build_connector;
use crate::config::AppConfig;
use crate::OutputFormat;

pub async fn cmd_health(config: AppConfig, format: OutputFormat) -> Result<()> {
    let connector = build_connector(&config)?;
    let health = connector.health_check().await?;

    if format == OutputFormat::Json {
        let status = serde_json::json!({
            "connector": connector.name(),
            "url": config.xdr.api_url,
            "health": health,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", "Connector Health".bold());
        println!("────────────────");
        let status = match &health {
            ConnectorHealth::Healthy => "Healthy".green(),
            ConnectorHealth::Degraded(reason) => format!("Degraded ({})", reason).yellow(),
            ConnectorHealth::Unhealthy(reason) => format!("Unhealthy ({})", reason).red(),
            ConnectorHealth::Unknown => "Unknown".yellow(),
        };
        println!("  {} [{}]: {}", connector.name().cyan(), config.xdr.api_url, status);
    }

    if !matches!(health, ConnectorHealth::Healthy) {
        std::process::exit(1);
    }
    Ok(())
}
