//! HTTP exposition of the metric store in the text gauge format.
//!
//! Each scrape copies the store once and renders outside any lock, so a slow
//! client never holds up writers or other scrapes.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use cmg_core::{GeneratorConfig, GeneratorError, MetricRecord, Result};

use crate::registry::{SourceRegistry, SourceView};
use crate::store::MetricStore;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// ── Rendering ────────────────────────────────────────────────────────

/// Render records as gauge families.
///
/// Records sharing a name are emitted under one `HELP`/`TYPE` header (the
/// first record's help wins). Families are ordered by name, samples by key.
pub fn render(records: &BTreeMap<String, MetricRecord>) -> std::result::Result<String, fmt::Error> {
    let mut ordered: Vec<(&String, &MetricRecord)> = records.iter().collect();
    ordered.sort_by(|a, b| a.1.name.cmp(&b.1.name).then_with(|| a.0.cmp(b.0)));

    let mut out = String::new();
    let mut current: Option<&str> = None;
    for (_, record) in ordered {
        if current != Some(record.name.as_str()) {
            writeln!(out, "# HELP {} {}", record.name, escape_help(&record.help))?;
            writeln!(out, "# TYPE {} gauge", record.name)?;
            current = Some(record.name.as_str());
        }
        write_sample(&mut out, record)?;
    }
    Ok(out)
}

fn write_sample(out: &mut String, record: &MetricRecord) -> fmt::Result {
    out.push_str(&record.name);
    if !record.labels.is_empty() {
        out.push('{');
        for (i, (k, v)) in record.labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write!(out, "{}=\"{}\"", k, escape_label_value(v))?;
        }
        out.push('}');
    }
    writeln!(out, " {}", record.value as f64)
}

fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

// ── Router ───────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    store: Arc<MetricStore>,
    registry: Arc<SourceRegistry>,
}

/// Routes: `GET <metrics_path>`, `GET /healthz`, `GET /sources`.
pub fn router(metrics_path: &str, store: Arc<MetricStore>, registry: Arc<SourceRegistry>) -> Router {
    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/sources", get(sources_handler))
        .with_state(AppState { store, registry })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.store.snapshot();
    match render(&snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            let err = GeneratorError::ExpositionFailure(e.to_string());
            error!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn sources_handler(State(state): State<AppState>) -> Json<Vec<SourceView>> {
    Json(state.registry.sources())
}

// ── Server ───────────────────────────────────────────────────────────

/// A bound exposition listener, ready to serve.
///
/// Binding is separate from serving so that an unusable address fails
/// startup before any background task runs.
pub struct ExpositionServer {
    listener: TcpListener,
    app: Router,
    metrics_path: String,
}

impl ExpositionServer {
    pub async fn bind(
        config: &GeneratorConfig,
        store: Arc<MetricStore>,
        registry: Arc<SourceRegistry>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address.as_str()).await?;
        Ok(Self {
            listener,
            app: router(&config.metrics_path, store, registry),
            metrics_path: config.metrics_path.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` turns `true` or its sender drops. In-flight
    /// responses are allowed to finish.
    pub async fn serve(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = self.local_addr()?;
        info!(addr = %addr, path = %self.metrics_path, "exposition server listening");

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown;
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await?;

        info!("exposition server stopped");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
