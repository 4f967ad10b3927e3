//! Periodic re-resolution of every registered source.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use cmg_core::GeneratorError;

use crate::registry::SourceRegistry;

/// Outcome of one sweep over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub refreshed: usize,
    pub skipped: usize,
}

/// Ticks at a fixed interval and refreshes every registered source.
///
/// Sweeps run one after another on a single task; a sweep that overruns
/// the interval delays the next tick instead of overlapping it.
#[derive(Debug)]
pub struct RefreshDriver {
    registry: Arc<SourceRegistry>,
    interval: Duration,
}

impl RefreshDriver {
    pub fn new(registry: Arc<SourceRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    /// Refresh every source registered when the sweep starts.
    ///
    /// A failing source is logged and counted, never fatal to the sweep.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        for key in self.registry.keys() {
            match self.registry.refresh_at(&key, now) {
                Ok(status) => {
                    debug!(key = %key, value = status.snapshot.current_value, "refreshed source");
                    report.refreshed += 1;
                }
                Err(GeneratorError::SourceNotFound(_)) => {
                    debug!(key = %key, "source unregistered during sweep, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to refresh source");
                    report.skipped += 1;
                }
            }
        }
        debug!(refreshed = report.refreshed, skipped = report.skipped, "refresh sweep complete");
        report
    }

    /// Run the tick loop until `shutdown` turns `true` or its sender drops.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "refresh driver started");

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = interval.tick() => {
                        self.sweep();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("refresh driver stopped");
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
