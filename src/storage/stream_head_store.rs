//! StreamHeadStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::model::StreamHead;

/// Interface for the denormalized per-stream summary.
///
/// # Key
///
/// Heads are keyed by `(bucket_id, stream_id)`.
///
/// # Implementations
///
/// - `MemoryStreamHeadStore`: in-process storage
/// - `MongoStreamHeadStore`: MongoDB storage
#[async_trait]
pub trait StreamHeadStore: Send + Sync {
    /// Provision indexes. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Record an append.
    ///
    /// Upserts: raises `head_revision` to at least `head_revision`, adds
    /// `event_count` to `unsnapshotted`, leaves `snapshot_revision` untouched.
    async fn increment(
        &self,
        bucket_id: &str,
        stream_id: &str,
        head_revision: u32,
        event_count: u32,
    ) -> Result<()>;

    /// Get the head for a stream, `None` if nothing was recorded.
    async fn get(&self, bucket_id: &str, stream_id: &str) -> Result<Option<StreamHead>>;

    /// Record a snapshot and the exact count of events after it.
    ///
    /// Upserts: sets `snapshot_revision` and `unsnapshotted`, raises
    /// `head_revision` to at least `snapshot_revision`.
    async fn reconcile(
        &self,
        bucket_id: &str,
        stream_id: &str,
        snapshot_revision: u32,
        unsnapshotted: u32,
    ) -> Result<()>;

    /// Remove the head for a stream.
    async fn delete(&self, bucket_id: &str, stream_id: &str) -> Result<()>;

    /// Heads of a bucket with `unsnapshotted >= threshold`, descending by
    /// `unsnapshotted`.
    async fn streams_to_snapshot(&self, bucket_id: &str, threshold: u32)
        -> Result<Vec<StreamHead>>;

    /// Erase heads, optionally only those of one bucket.
    async fn purge(&self, bucket_id: Option<&str>) -> Result<()>;

    /// Remove the collection and its indexes entirely.
    async fn drop_all(&self) -> Result<()>;
}
