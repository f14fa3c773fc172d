//! SQLite storage backend implementation
//!
//! Metrics live in a single table keyed by name, one row per metric:
//!
//! ```text
//! metrics(id TEXT PRIMARY KEY, type TEXT, delta INTEGER, value REAL, updated_at INTEGER)
//! ```
//!
//! Unlike the memory and file backends, a name is unique *across* kinds
//! here: updating an existing name with the other kind overwrites the row
//! and nulls the stale column. All writes are upserts.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS` at construction

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use crate::{MetricKind, MetricRecord};

/// SQLite-backed metric storage
///
/// Preferred backend when a database path is configured; the selector
/// falls back to file storage when construction fails.
#[derive(Debug)]
pub struct SqliteStorage {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStorage {
    /// Connect to the database at `db_path` and initialize the schema.
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Verify connectivity with a ping
    /// 3. Create the metrics table and index idempotently
    ///
    /// Any failure here is a connectivity signal for the backend selector.
    #[instrument(skip_all)]
    pub async fn connect(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("ping failed: {e}")))?;

        let storage = Self {
            pool,
            db_path: db_path_str,
        };
        storage.init_schema().await?;

        info!("SQLite backend ready");
        Ok(storage)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        debug!("creating metrics schema if missing");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                delta INTEGER,
                value REAL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_type ON metrics(type)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn record_from_row(row: &SqliteRow) -> StorageResult<MetricRecord> {
        let kind_str: String = row.get("type");
        let kind = match kind_str.as_str() {
            "gauge" => MetricKind::Gauge,
            "counter" => MetricKind::Counter,
            other => {
                return Err(StorageError::Serialization(format!(
                    "unknown metric type in row: {other}"
                )));
            }
        };

        Ok(MetricRecord {
            id: row.get("id"),
            kind,
            value: row.get("value"),
            delta: row.get("delta"),
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    #[instrument(skip(self, value), fields(db = %self.db_path))]
    async fn update_gauge(&self, name: &str, value: f64) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidMetric(
                "gauge name cannot be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO metrics (id, type, delta, value, updated_at)
            VALUES (?, ?, NULL, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                value = excluded.value,
                delta = NULL,
                type = excluded.type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(MetricKind::Gauge.to_string())
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, delta), fields(db = %self.db_path))]
    async fn update_counter(&self, name: &str, delta: i64) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidMetric(
                "counter name cannot be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO metrics (id, type, delta, value, updated_at)
            VALUES (?, ?, ?, NULL, ?)
            ON CONFLICT(id) DO UPDATE SET
                delta = COALESCE(metrics.delta, 0) + excluded.delta,
                value = NULL,
                type = excluded.type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(MetricKind::Counter.to_string())
        .bind(delta)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_gauge(&self, name: &str) -> StorageResult<Option<f64>> {
        let row = sqlx::query("SELECT value FROM metrics WHERE id = ? AND type = ?")
            .bind(name)
            .bind(MetricKind::Gauge.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<f64>, _>("value")))
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<i64>> {
        let row = sqlx::query("SELECT delta FROM metrics WHERE id = ? AND type = ?")
            .bind(name)
            .bind(MetricKind::Counter.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<i64>, _>("delta")))
    }

    async fn get_metric(&self, name: &str) -> StorageResult<Option<MetricRecord>> {
        let row = sqlx::query("SELECT id, type, delta, value FROM metrics WHERE id = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::record_from_row(&r)).transpose()
    }

    async fn all_metrics(&self) -> StorageResult<Vec<MetricRecord>> {
        let rows = sqlx::query("SELECT id, type, delta, value FROM metrics ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn update_batch(&self, records: Vec<MetricRecord>) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        debug!("applying batch of {} records", records.len());

        // one transaction: this backend's batch apply is atomic
        let mut tx = self.pool.begin().await?;

        for record in records {
            if record.id.is_empty() {
                return Err(StorageError::InvalidMetric(
                    "metric name cannot be empty".to_string(),
                ));
            }

            match record.kind {
                MetricKind::Gauge => {
                    let Some(value) = record.value else { continue };
                    sqlx::query(
                        r#"
                        INSERT INTO metrics (id, type, delta, value, updated_at)
                        VALUES (?, ?, NULL, ?, ?)
                        ON CONFLICT(id) DO UPDATE SET
                            value = excluded.value,
                            delta = NULL,
                            type = excluded.type,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(&record.id)
                    .bind(MetricKind::Gauge.to_string())
                    .bind(value)
                    .bind(Utc::now().timestamp_millis())
                    .execute(&mut *tx)
                    .await?;
                }
                MetricKind::Counter => {
                    let Some(delta) = record.delta else { continue };
                    sqlx::query(
                        r#"
                        INSERT INTO metrics (id, type, delta, value, updated_at)
                        VALUES (?, ?, ?, NULL, ?)
                        ON CONFLICT(id) DO UPDATE SET
                            delta = COALESCE(metrics.delta, 0) + excluded.delta,
                            value = NULL,
                            type = excluded.type,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(&record.id)
                    .bind(MetricKind::Counter.to_string())
                    .bind(delta)
                    .bind(Utc::now().timestamp_millis())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
