//! Registered sources and the records they publish.
//!
//! [`SourceRegistry`] is the registration capability: it owns every
//! [`SourceDefinition`], its latest [`SourceStatus`], and keeps exactly one
//! [`MetricRecord`] per key in the shared [`MetricStore`].
//!
//! Lock order is always sources → store. Store mutations for a key happen
//! while the sources lock is held, so a refresh racing an unregister can
//! never put the record back.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use cmg_core::{
    GeneratorConfig, GeneratorError, MetricRecord, Result, SourceDefinition, StatusSnapshot,
};
use cmg_schedule::{reference_instant, resolve_timezone, IntervalResolver};

use crate::sanitize;
use crate::store::MetricStore;

/// Constant label identifying the source that produced a record.
pub const ORIGIN_LABEL: &str = "origin";

// ── Types ────────────────────────────────────────────────────────────

/// Fallbacks for sources that leave a setting out.
#[derive(Debug, Clone)]
pub struct RegistryDefaults {
    pub timezone: Tz,
    pub offset_seconds: i64,
    pub metrics_prefix: String,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            offset_seconds: 0,
            metrics_prefix: String::new(),
        }
    }
}

impl RegistryDefaults {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            timezone: config.default_timezone()?,
            offset_seconds: config.offset_seconds,
            metrics_prefix: config.metrics_prefix.clone(),
        })
    }
}

/// Latest resolution of a source and when it was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
    pub last_refresh: DateTime<Utc>,
}

/// One entry of the `/sources` listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceView {
    pub key: String,
    pub metric_name: String,
    pub status: SourceStatus,
}

#[derive(Debug)]
struct RegisteredSource {
    definition: Arc<SourceDefinition>,
    metric_name: String,
    status: SourceStatus,
    /// Bumped on every registration; a refresh computed against an older
    /// generation is discarded.
    generation: u64,
}

// ── SourceRegistry ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, RegisteredSource>>,
    store: Arc<MetricStore>,
    resolver: IntervalResolver,
    defaults: RegistryDefaults,
    generation: AtomicU64,
}

impl SourceRegistry {
    pub fn new(store: Arc<MetricStore>, resolver: IntervalResolver, defaults: RegistryDefaults) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            store,
            resolver,
            defaults,
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn defaults(&self) -> &RegistryDefaults {
        &self.defaults
    }

    /// Register or replace a source, resolving it at the current time.
    pub fn register(&self, definition: SourceDefinition) -> Result<SourceStatus> {
        self.register_at(definition, Utc::now())
    }

    /// Register or replace a source, resolving it at `now`.
    ///
    /// The whole definition is rejected if any window expression is invalid,
    /// a label key is empty, or its timezone is unknown. On success the store
    /// record is fully replaced, never merged.
    pub fn register_at(&self, definition: SourceDefinition, now: DateTime<Utc>) -> Result<SourceStatus> {
        let key = definition.key.trim().to_string();
        if key.is_empty() {
            return Err(GeneratorError::Validation("source key must not be empty".to_string()));
        }

        let metric_name =
            sanitize::metric_name(&format!("{}{}", self.defaults.metrics_prefix, definition.metrics_name));
        if metric_name.is_empty() {
            return Err(GeneratorError::Validation(format!(
                "source '{}' has an empty metric name",
                key
            )));
        }

        if definition.labels.keys().any(|raw| sanitize::label_key(raw).is_empty()) {
            return Err(GeneratorError::Validation(format!(
                "source '{}' has an empty label key",
                key
            )));
        }

        self.resolver.validate(&definition.windows)?;
        let tz = resolve_timezone(definition.timezone.as_deref(), self.defaults.timezone)?;

        let at = reference_instant(now, tz, self.offset_for(&definition));
        let status = SourceStatus {
            snapshot: self.resolver.resolve(&definition.windows, &at),
            last_refresh: now,
        };
        let record = build_record(&key, &metric_name, &definition, status.snapshot.current_value);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut sources = self.sources_write();
        self.store.write(&key, record);
        let replaced = sources
            .insert(
                key.clone(),
                RegisteredSource {
                    definition: Arc::new(definition),
                    metric_name: metric_name.clone(),
                    status,
                    generation,
                },
            )
            .is_some();
        drop(sources);

        info!(
            key = %key,
            metric = %metric_name,
            value = status.snapshot.current_value,
            replaced,
            "registered source"
        );
        Ok(status)
    }

    /// Remove a source and its record. Absent keys are a no-op.
    pub fn unregister(&self, key: &str) -> bool {
        let mut sources = self.sources_write();
        let removed = sources.remove(key).is_some();
        self.store.delete(key);
        drop(sources);

        if removed {
            info!(key = %key, "unregistered source");
        }
        removed
    }

    /// Re-resolve one source at `now` and publish its value.
    ///
    /// Fails with [`GeneratorError::SourceNotFound`] when the key is no
    /// longer registered. Resolution itself cannot fail: invalid windows
    /// are skipped and an unknown timezone falls back to UTC.
    pub fn refresh_at(&self, key: &str, now: DateTime<Utc>) -> Result<SourceStatus> {
        let (definition, generation) = {
            let sources = self.sources_read();
            let entry = sources
                .get(key)
                .ok_or_else(|| GeneratorError::SourceNotFound(key.to_string()))?;
            (Arc::clone(&entry.definition), entry.generation)
        };

        let tz = match resolve_timezone(definition.timezone.as_deref(), self.defaults.timezone) {
            Ok(tz) => tz,
            Err(e) => {
                warn!(key = %key, error = %e, "unknown timezone, using UTC");
                chrono_tz::UTC
            }
        };
        let at = reference_instant(now, tz, self.offset_for(&definition));
        let status = SourceStatus {
            snapshot: self.resolver.resolve(&definition.windows, &at),
            last_refresh: now,
        };

        let mut sources = self.sources_write();
        let entry = sources
            .get_mut(key)
            .ok_or_else(|| GeneratorError::SourceNotFound(key.to_string()))?;
        if entry.generation != generation {
            debug!(key = %key, "source re-registered during refresh, keeping newer status");
            return Ok(entry.status);
        }
        entry.status = status;
        if !self.store.update_value(key, status.snapshot.current_value) {
            debug!(key = %key, "no record to update");
        }
        Ok(status)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources_read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn status(&self, key: &str) -> Option<SourceStatus> {
        self.sources_read().get(key).map(|s| s.status)
    }

    /// Latest status of every source, keyed and ordered by source key.
    pub fn statuses(&self) -> BTreeMap<String, SourceStatus> {
        self.sources_read()
            .iter()
            .map(|(key, s)| (key.clone(), s.status))
            .collect()
    }

    pub fn definition(&self, key: &str) -> Option<SourceDefinition> {
        self.sources_read().get(key).map(|s| s.definition.as_ref().clone())
    }

    /// Every source with its latest status, ordered by key.
    pub fn sources(&self) -> Vec<SourceView> {
        let mut views: Vec<SourceView> = self
            .sources_read()
            .iter()
            .map(|(key, s)| SourceView {
                key: key.clone(),
                metric_name: s.metric_name.clone(),
                status: s.status,
            })
            .collect();
        views.sort_by(|a, b| a.key.cmp(&b.key));
        views
    }

    pub fn len(&self) -> usize {
        self.sources_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources_read().is_empty()
    }

    fn offset_for(&self, definition: &SourceDefinition) -> i64 {
        definition.offset_seconds.unwrap_or(self.defaults.offset_seconds)
    }

    fn sources_read(&self) -> RwLockReadGuard<'_, HashMap<String, RegisteredSource>> {
        self.sources.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sources_write(&self) -> RwLockWriteGuard<'_, HashMap<String, RegisteredSource>> {
        self.sources.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Build the published record: sanitized label keys plus `origin = key`.
fn build_record(key: &str, metric_name: &str, definition: &SourceDefinition, value: i64) -> MetricRecord {
    let mut labels = BTreeMap::new();
    for (raw, v) in &definition.labels {
        let name = sanitize::label_key(raw);
        if let Some(previous) = labels.insert(name.clone(), v.clone()) {
            warn!(key = %key, label = %name, dropped = %previous, "label keys collide after sanitization");
        }
    }
    if labels.insert(ORIGIN_LABEL.to_string(), key.to_string()).is_some() {
        warn!(key = %key, "label '{}' is reserved and was overwritten", ORIGIN_LABEL);
    }

    MetricRecord {
        name: metric_name.to_string(),
        help: format!("auto generated metrics for {}", key),
        labels,
        value,
    }
}

// ── Tests ────────────────────────────────────────────────────────────
