//! Configuration validation for xdr-digest.
//!
//! Checks run before any request is sent, so a bad page size or missing
//! tenant URL fails fast instead of surfacing as a transport error.

use crate::config::AppConfig;
use colored::Colorize;
use xd_core::collector::MAX_PAGE_SIZE;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Problems that prevent a run.
    pub errors: Vec<String>,
    /// Problems worth fixing that do not prevent a run.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration before a run.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_xdr(config, &mut result);
        Self::validate_collection(config, &mut result);
        Self::validate_output(config, &mut result);

        result
    }

    fn validate_xdr(config: &AppConfig, result: &mut ValidationResult) {
        let xdr = &config.xdr;

        if xdr.api_url.trim().is_empty() {
            result.add_error(
                "Missing required config: xdr.api_url. \
                 Set it in the config file or via XDR_API_URL.",
            );
        } else if !xdr.api_url.starts_with("https://") && !xdr.api_url.starts_with("http://") {
            result.add_error(format!(
                "xdr.api_url must start with http:// or https://, got '{}'",
                xdr.api_url
            ));
        } else if xdr.api_url.starts_with("http://") {
            result.add_warning("xdr.api_url uses plain HTTP. API keys will be sent unencrypted.");
        }

        if !xdr.has_credentials() {
            result.add_warning(
                "XDR credentials not configured (xdr.api_key_id / xdr.api_key). \
                 Requests will be sent without authentication.",
            );
        }

        if !matches!(xdr.auth_type.as_str(), "standard" | "advanced") {
            result.add_error(format!(
                "Invalid xdr.auth_type '{}'. Valid values: standard, advanced",
                xdr.auth_type
            ));
        }

        if !xdr.verify_tls {
            result.add_warning("TLS certificate verification is disabled (xdr.verify_tls: false).");
        }

        if xdr.timeout_secs == 0 {
            result.add_error("xdr.timeout_secs must be greater than zero");
        }

        if xdr.requests_per_minute == Some(0) {
            result.add_error("xdr.requests_per_minute must be greater than zero when set");
        }
    }

    fn validate_collection(config: &AppConfig, result: &mut ValidationResult) {
        let collection = &config.collection;

        if collection.page_size == 0 || collection.page_size > MAX_PAGE_SIZE {
            result.add_error(format!(
                "collection.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, collection.page_size
            ));
        }

        if collection.max_concurrent == 0 {
            result.add_error("collection.max_concurrent must be greater than zero");
        } else if collection.max_concurrent > 32 {
            result.add_warning(format!(
                "collection.max_concurrent is {}. High fan-out may trip the tenant's API rate limit.",
                collection.max_concurrent
            ));
        }

        if collection.limit == Some(0) {
            result.add_error("collection.limit must be greater than zero when set");
        }

        if collection.hours == Some(0) {
            result.add_error("collection.hours must be greater than zero when set");
        }

        if collection.alerts_limit == 0 {
            result.add_warning("collection.alerts_limit is 0. Alert-level views will be empty.");
        }

        if collection.detail_timeout_secs == 0 {
            result.add_error("collection.detail_timeout_secs must be greater than zero");
        }
    }

    fn validate_output(config: &AppConfig, result: &mut ValidationResult) {
        if let Some(dir) = &config.output.directory {
            if dir.exists() && !dir.is_dir() {
                result.add_error(format!(
                    "output.directory '{}' exists and is not a directory",
                    dir.display()
                ));
            }
        }
    }
}
