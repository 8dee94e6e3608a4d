//! Show command - fetches and prints a single incident.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;
use xd_core::DetailFetcher;

use super::build_connector;
use crate::config::AppConfig;
use crate::render::render_incident_detail;
use crate::OutputFormat;

pub async fn cmd_show(config: AppConfig, incident_id: &str, format: OutputFormat) -> Result<()> {
    let connector = build_connector(&config)?;
    let fetcher = DetailFetcher::new(connector, config.collection.detail());

    let detail = fetcher
        .fetch_one(incident_id)
        .await
        .with_context(|| format!("Failed to fetch incident {}", incident_id))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&detail)?),
        OutputFormat::Text => {
            println!("{} {}", "Incident".bold(), incident_id.cyan());
            println!("{}", "─".repeat(40));
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            render_incident_detail(&mut handle, &detail)?;
            handle.flush()?;
        }
    }

    Ok(())
}
