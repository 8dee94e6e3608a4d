//! JSON export of a run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use xd_connectors::IncidentDetail;
use xd_core::RunOutput;

pub const RAW_FILE: &str = "incidents_raw.json";
pub const DETAILED_FILE: &str = "incidents_detailed.json";
pub const REPORT_FILE: &str = "report.json";

/// Writes summaries, details and the report to `dir`, creating it if needed.
///
/// Details are written in incident order; incidents whose detail could not
/// be fetched are left out.
pub fn write_exports(dir: &Path, output: &RunOutput) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let details: Vec<&IncidentDetail> = output
        .incidents
        .iter()
        .filter_map(|i| output.details.get(&i.incident_id))
        .collect();

    Ok(vec![
        write_json(&dir.join(RAW_FILE), &output.incidents)?,
        write_json(&dir.join(DETAILED_FILE), &details)?,
        write_json(&dir.join(REPORT_FILE), &output.report)?,
    ])
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Wrote export");
    Ok(path.to_path_buf())
}
