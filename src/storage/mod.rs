//! Durable storage backends for check history and incidents
//!
//! - **SQLite** (default): embedded database, survives restarts
//! - **In-Memory**: no persistence, for `backend = "none"` and tests

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

use crate::config::StorageConfig;

/// Build the backend selected by the configuration
pub async fn open_backend(config: &StorageConfig) -> StorageResult<Box<dyn StorageBackend>> {
    match config {
        StorageConfig::None { .. } => Ok(Box::new(MemoryBackend::new())),

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path, .. } => Ok(Box::new(sqlite::SqliteBackend::new(path).await?)),

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::InvalidConfig(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
