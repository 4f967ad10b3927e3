use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration;

/// One recurring interval `[occurrence, occurrence + duration)`, repeated
/// per the cron expression, carrying `value` while it is in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    /// Cron expression producing the window start instants.
    #[serde(rename = "start")]
    pub expression: String,
    #[serde(with = "duration::serde_str")]
    pub duration: Duration,
    pub value: i64,
}

impl ScheduleWindow {
    pub fn new(expression: impl Into<String>, duration: Duration, value: i64) -> Self {
        Self {
            expression: expression.into(),
            duration,
            value,
        }
    }
}

/// A registered source: the windows to resolve and how to publish the result.
///
/// Window order matters: on an exact tie in start instants the earlier
/// window wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDefinition {
    /// Opaque identifier. Loaders fill it from the file name when omitted.
    #[serde(default)]
    pub key: String,
    pub metrics_name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "metrics", default)]
    pub windows: Vec<ScheduleWindow>,
    /// IANA timezone name; the configured default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Signed shift applied to the reference instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_seconds: Option<i64>,
}

/// A value change point. `at` is `None` when no window ever occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transition {
    pub at: Option<DateTime<Utc>>,
    pub value: i64,
}

impl Transition {
    pub fn new(at: DateTime<Utc>, value: i64) -> Self {
        Self {
            at: Some(at),
            value,
        }
    }
}

/// The resolved state of a source at a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub current_value: i64,
    pub last: Transition,
    pub next: Transition,
}

/// One published gauge: exactly one per registered source key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub help: String,
    pub labels: BTreeMap<String, String>,
    pub value: i64,
}
