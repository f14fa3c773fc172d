//! Storage backends for metric persistence
//!
//! This module provides a trait-based abstraction for storing gauge and
//! counter metrics to various backends.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Selected once**: [`select::connect`] wires exactly one backend at
//!   startup and the choice is never re-evaluated while serving traffic
//!
//! ## Backends
//!
//! - **Memory**: volatile map-of-maps, discarded at process exit
//! - **File**: memory plus an atomically replaced JSON snapshot
//! - **SQLite** (feature `storage-sqlite`): relational table with upserts
//!
//! ## Usage
//!
//! ```no_run
//! use metric_tracker::config::StorageSettings;
//! use metric_tracker::storage::{self, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = StorageSettings::from_env();
//!     let store = storage::connect(&settings).await?;
//!     store.update_counter("PollCount", 1).await?;
//!     store.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod select;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileStorage, FlushPolicy};
pub use memory::MemoryStorage;
pub use select::connect;
