//! cmg-server: resolves cron-window sources and serves them as gauges.
//!
//! Startup: `.env` → CLI/env flags → tracing → config validation → source
//! loading (+ optional hot-reload) → listener bind → refresh loop + HTTP
//! server. SIGINT/SIGTERM stop both and let in-flight scrapes finish.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use cmg_core::config::load_dotenv;
use cmg_schedule::IntervalResolver;
use cmg_server::cli::{init_tracing, Cli};
use cmg_server::{
    ExpositionServer, LoadStatus, MetricStore, RefreshDriver, RegistryDefaults, SourceLoader,
    SourceRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing();

    let config = cli.into_config();
    config.validate()?;
    config.log_summary();

    let store = Arc::new(MetricStore::new());
    let registry = Arc::new(SourceRegistry::new(
        Arc::clone(&store),
        IntervalResolver::default(),
        RegistryDefaults::from_config(&config)?,
    ));

    // ── Sources ──────────────────────────────────────────────────────

    let mut loader = SourceLoader::new(config.sources_dir.clone(), Arc::clone(&registry));
    let results = loader.load_all()?;
    let loaded = results.iter().filter(|r| r.status.is_loaded()).count();
    let failed = results.iter().filter(|r| r.status.is_failed()).count();
    for result in &results {
        if let LoadStatus::Failed { error } = &result.status {
            warn!(path = %result.path.display(), error = %error, "source not registered");
        }
    }
    info!(loaded, failed, dir = %loader.sources_dir().display(), "sources loaded");

    if config.watch {
        if let Err(e) = loader.watch() {
            warn!(error = %e, "hot-reload disabled");
        }
    }

    // ── Serve ────────────────────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = ExpositionServer::bind(&config, Arc::clone(&store), Arc::clone(&registry)).await?;
    let driver = RefreshDriver::new(Arc::clone(&registry), config.interval).spawn(shutdown_rx.clone());
    let server_task = tokio::spawn(server.serve(shutdown_rx));

    shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    driver.await?;
    server_task.await??;
    drop(loader);

    info!("cmg-server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
