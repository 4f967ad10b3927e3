//! Command-line / environment configuration and logging setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cmg_core::GeneratorConfig;

// ── CLI ─────────────────────────────────────────────────────────────

/// Cron-window metrics generator: resolves scheduled windows and serves them as gauges.
#[derive(Parser, Debug, Clone)]
#[command(name = "cmg-server", version, about)]
pub struct Cli {
    /// Seconds between refresh sweeps.
    #[arg(long, env = "CMG_INTERVAL_SECONDS", default_value_t = 60)]
    pub interval_seconds: u64,

    /// Default signed shift (seconds) applied to the reference time.
    #[arg(long, env = "CMG_OFFSET_SECONDS", default_value_t = 0, allow_negative_numbers = true)]
    pub offset_seconds: i64,

    /// Default IANA timezone for sources that do not set one.
    #[arg(long, env = "CMG_TIMEZONE", default_value = "UTC")]
    pub timezone: String,

    /// Prefix prepended to every metric name.
    #[arg(long, env = "CMG_METRICS_PREFIX", default_value = "")]
    pub metrics_prefix: String,

    /// Listen address of the exposition endpoint.
    #[arg(long, env = "CMG_BIND_ADDRESS", default_value = "0.0.0.0:8082")]
    pub bind_address: String,

    /// HTTP path of the exposition endpoint.
    #[arg(long, env = "CMG_METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// Directory holding YAML source definitions.
    #[arg(long, env = "CMG_SOURCES_DIR", default_value = "sources")]
    pub sources_dir: PathBuf,

    /// Reload source files when they change (`--watch false` to disable).
    #[arg(long, env = "CMG_WATCH", default_value_t = true, action = clap::ArgAction::Set)]
    pub watch: bool,
}

impl Cli {
    pub fn into_config(self) -> GeneratorConfig {
        GeneratorConfig {
            interval: Duration::from_secs(self.interval_seconds),
            offset_seconds: self.offset_seconds,
            timezone: self.timezone,
            metrics_prefix: self.metrics_prefix,
            bind_address: self.bind_address,
            metrics_path: self.metrics_path,
            sources_dir: self.sources_dir,
            watch: self.watch,
        }
    }
}

/// Install the global `fmt` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
