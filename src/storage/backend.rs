//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use crate::MetricRecord;

/// Trait for metric storage backends
///
/// All backends (memory, file snapshot, SQLite) implement this trait. The
/// trait is designed to be:
///
/// - **Async**: All methods are async for compatibility with Tokio
/// - **Kind-aware**: Gauges overwrite, counters accumulate
/// - **Found-or-not**: Reads distinguish "absent" from "failed"
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is shared across
/// request call sites and background tasks for the process lifetime.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Reads return `Ok(None)` when no
/// metric matches — an `Err` always means an infrastructure problem, never
/// a miss.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Overwrite the gauge `name` with `value` unconditionally.
    ///
    /// Fails with [`StorageError::InvalidMetric`] when `name` is empty.
    ///
    /// [`StorageError::InvalidMetric`]: super::error::StorageError::InvalidMetric
    async fn update_gauge(&self, name: &str, value: f64) -> StorageResult<()>;

    /// Add `delta` to the counter `name`, starting from 0 when absent.
    ///
    /// `delta` may be negative. Fails with [`StorageError::InvalidMetric`]
    /// when `name` is empty.
    ///
    /// [`StorageError::InvalidMetric`]: super::error::StorageError::InvalidMetric
    async fn update_counter(&self, name: &str, delta: i64) -> StorageResult<()>;

    /// Current value of the gauge `name`, or `None` when absent.
    async fn get_gauge(&self, name: &str) -> StorageResult<Option<f64>>;

    /// Current total of the counter `name`, or `None` when absent.
    async fn get_counter(&self, name: &str) -> StorageResult<Option<i64>>;

    /// Look up a metric by name alone.
    ///
    /// Backends that keep gauges and counters in separate namespaces
    /// consult gauges first; the first match wins.
    async fn get_metric(&self, name: &str) -> StorageResult<Option<MetricRecord>>;

    /// Every stored metric, gauges and counters.
    ///
    /// No ordering is guaranteed beyond grouping by kind — callers that
    /// need determinism must sort.
    async fn all_metrics(&self) -> StorageResult<Vec<MetricRecord>>;

    /// Apply a list of records in one critical section.
    ///
    /// Counters are additively merged, gauges overwritten. Records missing
    /// the payload for their kind are skipped. Whether the batch is
    /// transactional against internal failure is backend-specific.
    async fn update_batch(&self, records: Vec<MetricRecord>) -> StorageResult<()>;

    /// Close the backend and release resources.
    ///
    /// Gracefully shuts down the backend, cancelling background work and
    /// flushing any pending state. Mandatory before process exit for
    /// durable backends.
    async fn close(&self) -> StorageResult<()>;
}
