//! Report command - collects, aggregates and renders a digest.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use xd_connectors::TimeWindow;
use xd_core::{Pipeline, RunOptions};
use xd_observability::PipelineMetrics;

use super::build_connector;
use crate::config::AppConfig;
use crate::export::write_exports;
use crate::render::render_report;
use crate::validator::ConfigValidator;
use crate::OutputFormat;

/// Command-line overrides for a report run.
#[derive(Debug, Clone, Default)]
pub struct ReportArgs {
    pub hours: Option<u32>,
    /// Ignore the look-back window and read the newest incidents.
    pub all: bool,
    pub limit: Option<usize>,
    pub page_size: Option<usize>,
    pub alerts_limit: Option<u32>,
    pub concurrency: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

impl ReportArgs {
    /// Layers these overrides onto the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        let collection = &mut config.collection;
        if self.all {
            collection.hours = None;
        } else if let Some(hours) = self.hours {
            collection.hours = Some(hours);
        }
        if let Some(limit) = self.limit {
            collection.limit = Some(limit);
        }
        if let Some(page_size) = self.page_size {
            collection.page_size = page_size;
        }
        if let Some(alerts_limit) = self.alerts_limit {
            collection.alerts_limit = alerts_limit;
        }
        if let Some(concurrency) = self.concurrency {
            collection.max_concurrent = concurrency;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = Some(dir.clone());
        }
    }
}

fn run_options(config: &AppConfig) -> RunOptions {
    let collection = &config.collection;
    RunOptions {
        window: collection
            .hours
            .map(|hours| TimeWindow::last_hours(Utc::now().timestamp_millis(), hours)),
        collector: collection.collector(),
        detail: collection.detail(),
    }
}

pub async fn cmd_report(mut config: AppConfig, args: ReportArgs, format: OutputFormat) -> Result<()> {
    args.apply(&mut config);

    let validation = ConfigValidator::validate(&config);
    if validation.has_errors() || format == OutputFormat::Text {
        validation.print();
    }
    if validation.has_errors() {
        println!();
        println!(
            "{}",
            "Report aborted due to configuration errors.".red().bold()
        );
        std::process::exit(1);
    }

    let connector = build_connector(&config)?;
    let metrics = Arc::new(PipelineMetrics::new());
    let pipeline = Pipeline::new(connector).with_metrics(metrics);

    if format == OutputFormat::Text {
        match config.collection.hours {
            Some(hours) => println!(
                "{} Collecting incidents from the last {} hours...",
                "[report]".cyan(),
                hours
            ),
            None => println!("{} Collecting newest incidents...", "[report]".cyan()),
        }
    }

    let output = pipeline
        .run(run_options(&config))
        .await
        .context("Incident collection failed, no data to report")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output.report)?),
        OutputFormat::Text => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            render_report(&mut handle, &output)?;
            handle.flush()?;
        }
    }

    if let Some(dir) = &config.output.directory {
        let paths = write_exports(dir, &output)?;
        if format == OutputFormat::Text {
            for path in paths {
                println!("  {} Saved {}", "→".green(), path.display());
            }
        }
    }

    Ok(())
}
