//! Subcommands that talk to the tenant.

mod health;
mod report;
mod show;

pub use health::cmd_health;
pub use report::{cmd_report, ReportArgs};
pub use show::cmd_show;

use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use xd_connectors::CortexXdrConnector;

/// Builds the Cortex XDR connector from configuration.
fn build_connector(config: &AppConfig) -> Result<Arc<CortexXdrConnector>> {
    let connector_config = config.xdr.connector_config()?;
    let connector = CortexXdrConnector::new(connector_config)
        .context("Failed to create Cortex XDR connector")?;
    Ok(Arc::new(connector))
}
