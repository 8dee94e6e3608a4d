//! xdr-digest CLI
//!
//! Collects Cortex XDR incidents, fans out for their alerts and artifacts,
//! and prints a digest with a risk assessment.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use xd_observability::LoggingConfig;

mod commands;
mod config;
mod export;
mod render;
mod validator;

use commands::{cmd_health, cmd_report, cmd_show, ReportArgs};
use config::AppConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "xdr-digest")]
#[command(version)]
#[command(about = "Incident digest and risk summary for Cortex XDR tenants", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Collect incidents and print the digest
    Report {
        /// Look-back window in hours
        #[arg(long)]
        hours: Option<u32>,

        /// Ignore the window and read the newest incidents
        #[arg(long, conflicts_with = "hours")]
        all: bool,

        /// Maximum number of incidents to analyze
        #[arg(short, long)]
        limit: Option<usize>,

        /// Incidents per page (1-100)
        #[arg(long)]
        page_size: Option<usize>,

        /// Alerts requested per incident detail
        #[arg(long)]
        alerts_limit: Option<u32>,

        /// Maximum detail requests in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write incidents_raw.json, incidents_detailed.json and report.json here
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show a single incident with its alerts and artifacts
    Show {
        /// Incident ID
        id: String,
    },

    /// Check connectivity and credentials
    Health,

    /// Validate configuration file
    Validate {
        /// Configuration file to validate (uses --config or default if not specified)
        #[arg(value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Show secrets (API keys)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let loaded = AppConfig::load(&config_path);
    let used_default = loaded.is_err();
    let mut config = loaded.unwrap_or_default();
    config.apply_env();

    xd_observability::init_logging_with_config(LoggingConfig::for_cli(
        &config.logging.level,
        config.logging.json_format || cli.format == OutputFormat::Json,
        cli.verbose,
    ));

    if used_default && cli.verbose {
        eprintln!("Using default configuration (no config file found)");
    }

    match cli.command {
        Commands::Report {
            hours,
            all,
            limit,
            page_size,
            alerts_limit,
            concurrency,
            output_dir,
        } => {
            let args = ReportArgs {
                hours,
                all,
                limit,
                page_size,
                alerts_limit,
                concurrency,
                output_dir,
            };
            cmd_report(config, args, cli.format).await
        }
        Commands::Show { id } => cmd_show(config, &id, cli.format).await,
        Commands::Health => cmd_health(config, cli.format).await,
        Commands::Validate { config: cfg_path } => cmd_validate(cfg_path.unwrap_or(config_path)),
        Commands::Config { show_secrets } => cmd_config(config, show_secrets, cli.format),
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "xdr-digest", "xdr-digest") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

fn cmd_validate(config_path: PathBuf) -> Result<()> {
    println!(
        "Validating configuration: {}",
        config_path.display().to_string().cyan()
    );

    let mut config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {:#}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };
    config.apply_env();

    let validation_result = ConfigValidator::validate(&config);
    validation_result.print();

    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  Tenant URL: {}", config.xdr.api_url);
    println!("  Auth: {}", config.xdr.auth_type);
    match config.collection.hours {
        Some(hours) => println!("  Window: last {} hours", hours),
        None => println!("  Window: none"),
    }
    println!(
        "  Page size: {} | Concurrency: {}",
        config.collection.page_size, config.collection.max_concurrent
    );

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        print!("{}", serde_yaml::to_string(&display_config)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_report_flags() {
        let cli = Cli::parse_from([
            "xdr-digest",
            "--format",
            "json",
            "report",
            "--hours",
            "12",
            "--limit",
            "200",
            "--concurrency",
            "4",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Report {
                hours,
                limit,
                concurrency,
                all,
                ..
            } => {
                assert_eq!(hours, Some(12));
                assert_eq!(limit, Some(200));
                assert_eq!(concurrency, Some(4));
                assert!(!all);
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn test_hours_conflicts_with_all() {
        let result = Cli::try_parse_from(["xdr-digest", "report", "--hours", "4", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
