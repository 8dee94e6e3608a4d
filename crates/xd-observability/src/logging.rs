//! Logging infrastructure for xdr-digest.
//!
//! Logs go to stderr so `--format json` report output on stdout stays
//! machine-readable.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates that receive the configured level when `RUST_LOG` is unset.
const LOG_TARGETS: &[&str] = &["xd_core", "xd_connectors", "xd_observability", "xdr_digest"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_location: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Settings for a CLI run. `--verbose` forces DEBUG with file/line info;
    /// otherwise `level` is parsed, falling back to INFO.
    pub fn for_cli(level: &str, json_format: bool, verbose: bool) -> Self {
        if verbose {
            return Self {
                level: Level::DEBUG,
                json_format,
                include_location: true,
                ..Self::default()
            };
        }
        Self {
            level: level.parse().unwrap_or(Level::INFO),
            json_format,
            ..Self::default()
        }
    }

    fn default_filter(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initializes the logging system with the given configuration.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    let result = if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Logging already initialized: {}", e);
    }
}

/// Creates a span for work on a single incident.
#[macro_export]
macro_rules! incident_span {
    ($incident_id:expr) => {
        tracing::info_span!("incident", incident_id = %$incident_id)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json_format);
    }

    #[test]
    fn test_cli_level_parsing() {
        assert_eq!(LoggingConfig::for_cli("warn", false, false).level, Level::WARN);
        assert_eq!(LoggingConfig::for_cli("nonsense", false, false).level, Level::INFO);
    }

    #[test]
    fn test_verbose_overrides_level() {
        let config = LoggingConfig::for_cli("error", true, true);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_location);
        assert!(config.json_format);
    }

    #[test]
    fn test_default_filter_covers_all_crates() {
        let filter = LoggingConfig::for_cli("info", false, true).default_filter();
        assert!(filter.contains("xd_core=debug"));
        assert!(filter.contains("xdr_digest=debug"));
    }
}
