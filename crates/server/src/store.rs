//! The concurrent key → record map read by scrapes and written by refreshes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cmg_core::MetricRecord;

// ── MetricStore ──────────────────────────────────────────────────────

/// Thread-safe store of the last published record per source key.
///
/// Many readers, one writer at a time. Every mutation is a single map
/// operation under the write lock, so a reader sees a record either wholly
/// before or wholly after a change. [`snapshot`](MetricStore::snapshot)
/// copies under the read lock and hands back an owned map; serialization
/// happens after the lock is released.
#[derive(Debug, Default)]
pub struct MetricStore {
    records: RwLock<HashMap<String, MetricRecord>>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the record for `key`.
    pub fn write(&self, key: &str, record: MetricRecord) {
        self.write_guard().insert(key.to_string(), record);
    }

    /// Replace only the value of an existing record.
    ///
    /// Returns `false` when `key` is absent: a delete won the race with a
    /// refresh, which is not an error.
    pub fn update_value(&self, key: &str, value: i64) -> bool {
        match self.write_guard().get_mut(key) {
            Some(record) => {
                record.value = value;
                true
            }
            None => false,
        }
    }

    /// Remove the record for `key`. Returns whether one was present.
    pub fn delete(&self, key: &str) -> bool {
        self.write_guard().remove(key).is_some()
    }

    /// Point-in-time copy of every record, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, MetricRecord> {
        self.read_guard()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<MetricRecord> {
        self.read_guard().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    // A panicking writer cannot leave a torn record behind, so the data
    // under a poisoned lock is still consistent.
    fn read_guard(&self) -> RwLockReadGuard<'_, HashMap<String, MetricRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<String, MetricRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
