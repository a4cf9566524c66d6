//! The persistence engine.
//!
//! [`Persistence`] turns the stores' atomic insert-with-uniqueness primitive
//! into an at-most-once, totally ordered append log, and maintains the
//! auxiliary structures around it:
//!
//! - `checkpoint`: candidate checkpoint allocation
//! - `append`: the commit append protocol
//! - `stream_heads`: detached stream head updates
//! - `snapshots`: snapshot writes and head reconciliation
//! - `recycle`: soft delete, reclamation, purge and drop
//! - `queries`: ordered reads
//!
//! The engine holds no authority over global state. Its checkpoint cache and
//! append lock only reduce wasted work inside one process; correctness across
//! processes comes from the stores' uniqueness constraints.

mod append;
mod checkpoint;
mod error;
mod queries;
mod recycle;
mod snapshots;
mod stream_heads;


pub use checkpoint::CheckpointAllocator;
pub use error::{PersistenceError, Result};
pub use recycle::RecyclerHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::PersistenceConfig;
use crate::model::RECYCLE_BUCKET;
use crate::serialization::{JsonSerializer, Serializer};
use crate::storage::{StorageError, Stores};

use stream_heads::StreamHeadMaintainer;

/// Event store persistence engine.
///
/// Share it behind an `Arc`; every operation takes `&self`.
pub struct Persistence {
    stores: Stores,
    serializer: Arc<dyn Serializer>,
    checkpoints: CheckpointAllocator,
    stream_heads: StreamHeadMaintainer,
    /// Serializes appends, purges and drops issued by this process.
    append_lock: Mutex<()>,
    initialized: Mutex<bool>,
    disposed: AtomicBool,
}

impl Persistence {
    pub fn new(stores: Stores, serializer: Arc<dyn Serializer>, config: PersistenceConfig) -> Self {
        let checkpoints = CheckpointAllocator::new(Arc::clone(&stores.commits));
        let stream_heads = StreamHeadMaintainer::new(
            Arc::clone(&stores.stream_heads),
            !config.disable_snapshot_support,
        );

        Self {
            stores,
            serializer,
            checkpoints,
            stream_heads,
            append_lock: Mutex::new(()),
            initialized: Mutex::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Engine over fresh in-memory stores with JSON payloads.
    pub fn in_memory() -> Self {
        Self::new(
            Stores::memory(),
            Arc::new(JsonSerializer),
            PersistenceConfig::default(),
        )
    }

    /// The stores this engine runs on.
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// The checkpoint allocator.
    pub fn checkpoints(&self) -> &CheckpointAllocator {
        &self.checkpoints
    }

    /// Provision store indexes.
    ///
    /// Idempotent. Concurrent first calls provision once; later calls return
    /// immediately until `drop` clears the stores again.
    #[tracing::instrument(skip_all)]
    pub async fn initialize(&self) -> Result<()> {
        self.ensure_live()?;
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        self.stores.commits.initialize().await?;
        self.stores.stream_heads.initialize().await?;
        self.stores.snapshots.initialize().await?;

        *initialized = true;
        info!("Persistence initialized");
        Ok(())
    }

    /// Tear the engine down. Every later call fails with `Disposed`.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            info!("Persistence disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Wait for every dispatched stream head update to finish.
    pub async fn settle_stream_heads(&self) {
        self.stream_heads.settle().await;
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(PersistenceError::Disposed);
        }
        Ok(())
    }

    fn ensure_user_bucket(&self, bucket_id: &str) -> Result<()> {
        if bucket_id == RECYCLE_BUCKET {
            return Err(PersistenceError::ReservedBucket(bucket_id.to_string()));
        }
        Ok(())
    }

    fn encode<T: serde::Serialize>(&self, value: &T) -> std::result::Result<Vec<u8>, StorageError> {
        let tree =
            serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.serializer.serialize(&tree)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> std::result::Result<T, StorageError> {
        let tree = self.serializer.deserialize(bytes)?;
        serde_json::from_value(tree).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("stores", &self.stores)
            .field("cached_checkpoint", &self.checkpoints.cached())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
