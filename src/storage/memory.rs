//! In-memory storage backend (no persistence)
//!
//! Gauges and counters live in two separate maps guarded by a single
//! readers-writer lock: reads proceed concurrently, writes exclude
//! everything. The lock is deliberately coarse — expected key cardinality
//! is tens to low hundreds.
//!
//! A name may exist in both namespaces at once; [`MemoryStorage::get_metric`]
//! resolves gauges first. All data is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use crate::{MetricKind, MetricRecord};

#[derive(Debug, Default)]
struct Namespaces {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// Volatile metric storage
///
/// Created empty at process start and discarded at exit. Also serves as
/// the in-memory half of [`FileStorage`].
///
/// [`FileStorage`]: super::file::FileStorage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Namespaces>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire contents with `records`.
    ///
    /// Used when hydrating from a snapshot; counters are set, not merged.
    /// Records missing the payload for their kind are skipped.
    pub(crate) async fn replace_all(&self, records: Vec<MetricRecord>) {
        let mut ns = self.inner.write().await;
        ns.gauges.clear();
        ns.counters.clear();

        for record in records {
            match record.kind {
                MetricKind::Gauge => {
                    if let Some(value) = record.value {
                        ns.gauges.insert(record.id, value);
                    }
                }
                MetricKind::Counter => {
                    if let Some(delta) = record.delta {
                        ns.counters.insert(record.id, delta);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidMetric(
                "gauge name cannot be empty".to_string(),
            ));
        }

        let mut ns = self.inner.write().await;
        ns.gauges.insert(name.to_string(), value);
        Ok(())
    }

    async fn update_counter(&self, name: &str, delta: i64) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidMetric(
                "counter name cannot be empty".to_string(),
            ));
        }

        let mut ns = self.inner.write().await;
        *ns.counters.entry(name.to_string()).or_insert(0) += delta;
        Ok(())
    }

    async fn get_gauge(&self, name: &str) -> StorageResult<Option<f64>> {
        let ns = self.inner.read().await;
        Ok(ns.gauges.get(name).copied())
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<i64>> {
        let ns = self.inner.read().await;
        Ok(ns.counters.get(name).copied())
    }

    async fn get_metric(&self, name: &str) -> StorageResult<Option<MetricRecord>> {
        let ns = self.inner.read().await;

        // gauge namespace first; ordering matters when a name exists in both
        if let Some(value) = ns.gauges.get(name) {
            return Ok(Some(MetricRecord::gauge(name, *value)));
        }

        if let Some(delta) = ns.counters.get(name) {
            return Ok(Some(MetricRecord::counter(name, *delta)));
        }

        Ok(None)
    }

    async fn all_metrics(&self) -> StorageResult<Vec<MetricRecord>> {
        let ns = self.inner.read().await;
        let mut records = Vec::with_capacity(ns.gauges.len() + ns.counters.len());

        for (name, value) in &ns.gauges {
            records.push(MetricRecord::gauge(name.clone(), *value));
        }

        for (name, delta) in &ns.counters {
            records.push(MetricRecord::counter(name.clone(), *delta));
        }

        Ok(records)
    }

    async fn update_batch(&self, records: Vec<MetricRecord>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        // one lock hold: readers observe the batch as a whole, but there is
        // no rollback on a mid-batch validation failure
        let mut ns = self.inner.write().await;

        for record in records {
            if record.id.is_empty() {
                return Err(StorageError::InvalidMetric(
                    "metric name cannot be empty".to_string(),
                ));
            }

            match record.kind {
                MetricKind::Gauge => {
                    if let Some(value) = record.value {
                        ns.gauges.insert(record.id, value);
                    }
                }
                MetricKind::Counter => {
                    if let Some(delta) = record.delta {
                        *ns.counters.entry(record.id).or_insert(0) += delta;
                    }
                }
            }
        }

        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
