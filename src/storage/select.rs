//! One-time backend selection
//!
//! Runs at process startup and wires exactly one backend behind the
//! [`StorageBackend`] trait for the remainder of the process lifetime:
//!
//! 1. A configured database path is tried first (connect, ping, schema)
//! 2. Any failure there downgrades to file snapshot storage with a
//!    warning — startup does not fail
//! 3. Without a database path the file backend is used directly
//!
//! The decision is never re-evaluated while serving traffic. A write that
//! fails against a previously healthy relational backend surfaces as an
//! error to the caller; there is no runtime fallback path.

use tracing::{info, instrument, warn};

use super::backend::StorageBackend;
use super::error::StorageResult;
use super::file::FileStorage;
#[cfg(feature = "storage-sqlite")]
use super::sqlite::SqliteStorage;
use crate::config::StorageSettings;

/// Construct the storage backend described by `settings`.
#[instrument(skip(settings))]
pub async fn connect(settings: &StorageSettings) -> StorageResult<Box<dyn StorageBackend>> {
    #[cfg(feature = "storage-sqlite")]
    if let Some(db_path) = &settings.database_path {
        match SqliteStorage::connect(db_path).await {
            Ok(storage) => {
                info!("using sqlite storage at {}", db_path.display());
                return Ok(Box::new(storage));
            }
            Err(e) => {
                warn!("database backend unavailable ({e}); falling back to file snapshot storage");
            }
        }
    }

    #[cfg(not(feature = "storage-sqlite"))]
    if settings.database_path.is_some() {
        warn!(
            "database path configured but built without the storage-sqlite feature; using file snapshot storage"
        );
    }

    let storage = FileStorage::open(
        settings.snapshot_path.clone(),
        settings.flush_policy(),
        settings.restore,
    )
    .await?;

    info!(
        "using file snapshot storage at {}",
        settings.snapshot_path.display()
    );
    Ok(Box::new(storage))
}
