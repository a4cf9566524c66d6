//! Storage interfaces and implementations.

use std::sync::Arc;

use tracing::info;

use crate::config::{StorageConfig, StorageType};

mod commit_store;
mod snapshot_store;
mod stream_head_store;

pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use commit_store::{CommitScope, CommitStore};
pub use snapshot_store::SnapshotStore;
pub use stream_head_store::StreamHeadStore;

pub use memory::{MemoryCommitStore, MemorySnapshotStore, MemoryStreamHeadStore};

#[cfg(feature = "mongodb")]
pub use self::mongodb::{MongoCommitStore, MongoSnapshotStore, MongoStreamHeadStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors reported by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Transport or connectivity failure. Never retried by this layer.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other store-reported failure.
    #[error("Storage fault: {0}")]
    Fault(String),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Uniqueness constraint that rejected an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Another record already holds the checkpoint.
    Checkpoint,
    /// The stream already holds a record with this commit id.
    CommitId,
    /// The stream already holds a record at this revision range or sequence.
    StreamRange,
}

/// Failure of an atomic insert.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("Uniqueness violation: {0:?}")]
    Violation(Constraint),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The three stores a persistence engine runs on.
#[derive(Clone)]
pub struct Stores {
    pub commits: Arc<dyn CommitStore>,
    pub stream_heads: Arc<dyn StreamHeadStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl Stores {
    /// Fresh in-memory stores.
    pub fn memory() -> Self {
        Self {
            commits: Arc::new(MemoryCommitStore::new()),
            stream_heads: Arc::new(MemoryStreamHeadStore::new()),
            snapshots: Arc::new(MemorySnapshotStore::new()),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("commits", &"<dyn CommitStore>")
            .field("stream_heads", &"<dyn StreamHeadStore>")
            .field("snapshots", &"<dyn SnapshotStore>")
            .finish()
    }
}

/// Initialize storage based on configuration.
///
/// Connects to the configured backend. Index provisioning is left to
/// `Persistence::initialize`.
pub async fn init_storage(config: &StorageConfig) -> Result<Stores> {
    match config.storage_type {
        StorageType::Memory => {
            info!(storage_type = "memory", "Storage initialized");
            Ok(Stores::memory())
        }
        #[cfg(feature = "mongodb")]
        StorageType::Mongodb => {
            info!(
                storage_type = "mongodb",
                database = %config.mongodb.database,
                "Connecting to storage"
            );
            let client = ::mongodb::Client::with_uri_str(&config.mongodb.uri).await?;
            let database = client.database(&config.mongodb.database);

            Ok(Stores {
                commits: Arc::new(MongoCommitStore::new(&database)),
                stream_heads: Arc::new(MongoStreamHeadStore::new(&database)),
                snapshots: Arc::new(MongoSnapshotStore::new(&database)),
            })
        }
        #[cfg(not(feature = "mongodb"))]
        StorageType::Mongodb => {
            tracing::error!("MongoDB storage requested but 'mongodb' feature is not enabled");
            Err(StorageError::Fault(
                "MongoDB feature not enabled".to_string(),
            ))
        }
    }
}
