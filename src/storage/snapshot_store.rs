//! SnapshotStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::model::SnapshotRecord;

/// Interface for snapshot persistence.
///
/// Snapshots are an optimization that bounds replay cost. Several revisions
/// may coexist per stream; readers ask for the newest one not exceeding a
/// revision bound.
///
/// # Implementations
///
/// - `MemorySnapshotStore`: in-process storage
/// - `MongoSnapshotStore`: MongoDB storage
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Provision indexes. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Store a snapshot keyed by `(bucket_id, stream_id, stream_revision)`.
    ///
    /// Overwrites an existing snapshot at the same revision.
    async fn upsert(&self, record: &SnapshotRecord) -> Result<()>;

    /// Retrieve the snapshot with the highest revision `<= max_revision`.
    async fn get_at_or_below(
        &self,
        bucket_id: &str,
        stream_id: &str,
        max_revision: u32,
    ) -> Result<Option<SnapshotRecord>>;

    /// Delete every snapshot of a stream.
    async fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()>;

    /// Erase snapshots, optionally only those of one bucket.
    async fn purge(&self, bucket_id: Option<&str>) -> Result<()>;

    /// Remove the collection and its indexes entirely.
    async fn drop_all(&self) -> Result<()>;
}
