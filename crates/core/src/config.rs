use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| GeneratorError::InvalidTimezone(name.to_string()))
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Period between refresh sweeps.
    pub interval: Duration,
    /// Reference-time shift for sources that do not set their own.
    pub offset_seconds: i64,
    /// Timezone for sources that do not set their own.
    pub timezone: String,
    /// Prepended to every metric name before sanitization.
    pub metrics_prefix: String,
    pub bind_address: String,
    pub metrics_path: String,
    /// Directory holding YAML source definitions.
    pub sources_dir: PathBuf,
    /// Hot-reload source files on change.
    pub watch: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            offset_seconds: 0,
            timezone: "UTC".to_string(),
            metrics_prefix: String::new(),
            bind_address: "0.0.0.0:8082".to_string(),
            metrics_path: "/metrics".to_string(),
            sources_dir: PathBuf::from("sources"),
            watch: true,
        }
    }
}

/// Paths served next to the metrics endpoint.
const RESERVED_PATHS: &[&str] = &["/healthz", "/sources"];

impl GeneratorConfig {
    /// Resolve the configured default timezone.
    pub fn default_timezone(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(GeneratorError::Validation(
                "refresh interval must be greater than zero".to_string(),
            ));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(GeneratorError::Validation(format!(
                "metrics path '{}' must start with '/'",
                self.metrics_path
            )));
        }
        if self.metrics_path.contains(['{', '}', '*']) || self.metrics_path.contains("/:") {
            return Err(GeneratorError::Validation(format!(
                "metrics path '{}' must be a literal path",
                self.metrics_path
            )));
        }
        if RESERVED_PATHS.contains(&self.metrics_path.as_str()) {
            return Err(GeneratorError::Validation(format!(
                "metrics path '{}' is reserved",
                self.metrics_path
            )));
        }
        if self.bind_address.trim().is_empty() {
            return Err(GeneratorError::Validation(
                "bind address must not be empty".to_string(),
            ));
        }
        self.default_timezone()?;
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  refresh:     interval={}s", self.interval.as_secs());
        tracing::info!("  reference:   timezone={}, offset={}s", self.timezone, self.offset_seconds);
        tracing::info!(
            "  exposition:  addr={}, path={}, prefix={}",
            self.bind_address,
            self.metrics_path,
            if self.metrics_prefix.is_empty() { "(none)" } else { &self.metrics_prefix }
        );
        tracing::info!("  sources:     dir={}, watch={}", self.sources_dir.display(), self.watch);
    }
}
