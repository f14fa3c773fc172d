use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::storage::file::FlushPolicy;

const DATABASE_PATH: &str = "DATABASE_PATH";

const SNAPSHOT_PATH: &str = "SNAPSHOT_PATH";

const STORE_INTERVAL: &str = "STORE_INTERVAL";

const RESTORE: &str = "RESTORE";

/// Storage subsystem configuration
///
/// All fields have sensible defaults, so `{}` is a valid configuration
/// file. When `database_path` is set the relational backend is preferred;
/// otherwise (or when the database is unreachable at startup) metrics are
/// persisted to the JSON snapshot at `snapshot_path`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageSettings {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Path of the JSON snapshot written by the file backend
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Seconds between periodic snapshots; 0 flushes synchronously on every
    /// update
    #[serde(default = "default_flush_interval")]
    pub flush_interval: u64,

    /// Hydrate the file backend from an existing snapshot on startup
    #[serde(default = "default_restore")]
    pub restore: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            snapshot_path: default_snapshot_path(),
            flush_interval: default_flush_interval(),
            restore: default_restore(),
        }
    }
}

impl StorageSettings {
    /// Build settings from environment variables, falling back to the
    /// defaults for anything unset or unparsable. A `.env` file in the
    /// working directory is honored.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_path: std::env::var(DATABASE_PATH).ok().map(PathBuf::from),
            snapshot_path: std::env::var(SNAPSHOT_PATH)
                .map_or(default_snapshot_path(), PathBuf::from),
            flush_interval: std::env::var(STORE_INTERVAL).map_or(default_flush_interval(), |res| {
                res.parse().unwrap_or(default_flush_interval())
            }),
            restore: std::env::var(RESTORE)
                .map_or(default_restore(), |res| res.parse().unwrap_or(default_restore())),
        }
    }

    /// Durability policy derived from `flush_interval`.
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::from_interval(Duration::from_secs(self.flush_interval))
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./metrics.json")
}

fn default_flush_interval() -> u64 {
    300
}

fn default_restore() -> bool {
    true
}

pub fn read_config_file(path: &str) -> anyhow::Result<StorageSettings> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|settings| trace!("loaded storage settings: {settings:?}"))
}
