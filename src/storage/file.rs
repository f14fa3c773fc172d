//! File-backed storage with atomic JSON snapshots
//!
//! This backend wraps [`MemoryStorage`] and persists the full metric set to
//! a JSON snapshot file. Durability is governed by a [`FlushPolicy`] fixed
//! at construction:
//!
//! - **Write-through** (interval 0): every update is followed by a
//!   synchronous snapshot write — zero durability gap, higher latency
//! - **Write-back** (interval > 0): updates are memory-only; a background
//!   task snapshots on each tick, bounding the gap to one interval
//!
//! ## Snapshot atomicity
//!
//! A snapshot is written to `<path>.tmp` and renamed over `<path>`. The
//! rename is the sole atomicity boundary: a concurrent reader of the
//! canonical path observes either the previous complete snapshot or the
//! new complete snapshot, never a partial write.
//!
//! ## Shutdown
//!
//! [`StorageBackend::close`] cancels the flush task, awaits it, then
//! performs one final save whose error propagates to the caller. Skipping
//! `close` can lose up to one flush interval of data.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::memory::MemoryStorage;
use crate::MetricRecord;

/// Durability policy of a [`FileStorage`], selected once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Snapshot synchronously after every update.
    WriteThrough,

    /// Snapshot from a background task on each tick.
    Periodic(Duration),
}

impl FlushPolicy {
    /// An interval of zero selects write-through.
    pub fn from_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            Self::WriteThrough
        } else {
            Self::Periodic(interval)
        }
    }
}

/// Shared between the storage handle and the background flush task.
#[derive(Debug)]
struct SnapshotCore {
    memory: MemoryStorage,
    path: PathBuf,

    /// Serializes save calls so concurrent write-through updates cannot
    /// interleave temp-file writes and renames.
    write_guard: Mutex<()>,
}

impl SnapshotCore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn save(&self) -> StorageResult<()> {
        let records = self.memory.all_metrics().await?;
        let data = serde_json::to_vec_pretty(&records)
            .map_err(|e| StorageError::Serialization(format!("failed to encode snapshot: {e}")))?;

        let _guard = self.write_guard.lock().await;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("snapshot of {} metrics written", records.len());
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> StorageResult<usize> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no snapshot file, starting empty");
                return Ok(0);
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        // a malformed snapshot fails the whole load: it was written as a
        // complete set, so partial validity indicates corruption
        let records: Vec<MetricRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization(format!(
                "malformed snapshot {}: {e}",
                self.path.display()
            ))
        })?;

        let count = records.len();
        self.memory.replace_all(records).await;
        Ok(count)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Durable file-backed metric storage
///
/// Wraps a [`MemoryStorage`] for all reads and writes; the snapshot file
/// only enters the picture on load, save and shutdown.
#[derive(Debug)]
pub struct FileStorage {
    core: Arc<SnapshotCore>,
    policy: FlushPolicy,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<()>,
}

impl FileStorage {
    /// Open a file-backed store at `path`.
    ///
    /// With `restore`, hydrates from an existing snapshot first — a
    /// missing file is not an error, a malformed one is. With a periodic
    /// policy, spawns the background flush task.
    pub async fn open(
        path: impl Into<PathBuf>,
        policy: FlushPolicy,
        restore: bool,
    ) -> StorageResult<Self> {
        let core = Arc::new(SnapshotCore {
            memory: MemoryStorage::new(),
            path: path.into(),
            write_guard: Mutex::new(()),
        });

        if restore {
            let count = core.load().await?;
            if count > 0 {
                info!("restored {count} metrics from {}", core.path.display());
            }
        }

        let (shutdown, _) = watch::channel(());

        let flush_task = match policy {
            FlushPolicy::Periodic(every) => Some(Self::spawn_flush_task(
                Arc::clone(&core),
                every,
                shutdown.subscribe(),
            )),
            FlushPolicy::WriteThrough => None,
        };

        Ok(Self {
            core,
            policy,
            flush_task: Mutex::new(flush_task),
            shutdown,
        })
    }

    fn spawn_flush_task(
        core: Arc<SnapshotCore>,
        every: Duration,
        mut shutdown: watch::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // transient failures are logged and the ticker
                        // proceeds; no retry or backoff
                        if let Err(e) = core.save().await {
                            warn!("periodic snapshot failed: {e}");
                        }
                    }
                    _ = shutdown.changed() => {
                        debug!("flush task shutting down");
                        break;
                    }
                }
            }
        })
    }

    async fn after_update(&self) -> StorageResult<()> {
        match self.policy {
            FlushPolicy::WriteThrough => self.core.save().await,
            FlushPolicy::Periodic(_) => Ok(()),
        }
    }

    /// Snapshot path this store persists to.
    pub fn path(&self) -> &Path {
        &self.core.path
    }

    /// Write a snapshot of the current metric set now.
    pub async fn save(&self) -> StorageResult<()> {
        self.core.save().await
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn update_gauge(&self, name: &str, value: f64) -> StorageResult<()> {
        self.core.memory.update_gauge(name, value).await?;
        self.after_update().await
    }

    async fn update_counter(&self, name: &str, delta: i64) -> StorageResult<()> {
        self.core.memory.update_counter(name, delta).await?;
        self.after_update().await
    }

    async fn get_gauge(&self, name: &str) -> StorageResult<Option<f64>> {
        self.core.memory.get_gauge(name).await
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<i64>> {
        self.core.memory.get_counter(name).await
    }

    async fn get_metric(&self, name: &str) -> StorageResult<Option<MetricRecord>> {
        self.core.memory.get_metric(name).await
    }

    async fn all_metrics(&self) -> StorageResult<Vec<MetricRecord>> {
        self.core.memory.all_metrics().await
    }

    async fn update_batch(&self, records: Vec<MetricRecord>) -> StorageResult<()> {
        self.core.memory.update_batch(records).await?;
        self.after_update().await
    }

    async fn close(&self) -> StorageResult<()> {
        if let Some(task) = self.flush_task.lock().await.take() {
            let _ = self.shutdown.send(());
            if let Err(e) = task.await {
                warn!("flush task ended abnormally: {e}");
            }
        }

        // mandatory final flush; its error propagates to the exit path
        self.core.save().await
    }
}
