//! CommitStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{InsertError, Result};
use crate::model::CommitRecord;

/// Which partition a checkpoint query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitScope<'a> {
    /// Live commits of one bucket.
    Bucket(&'a str),
    /// Live commits of every bucket; the recycle partition is excluded.
    Live,
    /// Only the recycle partition.
    Recycled,
}

/// Interface for commit persistence.
///
/// This is the document-store seam the append protocol is built on. A
/// backend must provide an atomic single-record insert that enforces three
/// independent uniqueness constraints and reports which one rejected the
/// record:
///
/// - `checkpoint` across every record, recycled ones included
/// - `(bucket_id, origin_bucket_id, stream_id, commit_id)`
/// - `(bucket_id, origin_bucket_id, stream_id, revision_from, revision_to)` and
///   `(bucket_id, origin_bucket_id, stream_id, commit_sequence)`, both reported
///   as [`Constraint::StreamRange`](super::Constraint::StreamRange)
///
/// For live records `origin_bucket_id == bucket_id`, so the tuples reduce to
/// the `(bucket_id, stream_id, ...)` keys. Recycled records keep their origin
/// so that deleted streams from different buckets never collide.
///
/// Implementations:
/// - `MemoryCommitStore`: in-process emulation for tests and local runs
/// - `MongoCommitStore`: MongoDB unique indexes
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Provision indexes. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Atomically insert a record.
    async fn insert(&self, record: &CommitRecord) -> std::result::Result<(), InsertError>;

    /// Find the live record occupying a stream position: same commit
    /// sequence, or the exact same revision range.
    async fn find_occupant(
        &self,
        bucket_id: &str,
        stream_id: &str,
        commit_sequence: u32,
        revision_from: u32,
        revision_to: u32,
    ) -> Result<Option<CommitRecord>>;

    /// Highest checkpoint held by any record, recycled ones included.
    async fn max_checkpoint(&self) -> Result<Option<i64>>;

    /// Records whose revision range intersects `[min_revision, max_revision]`,
    /// ordered by `revision_from` ascending.
    async fn by_revision(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<CommitRecord>>;

    /// Records of a bucket with `start <= commit_stamp < end`, ordered by
    /// checkpoint ascending. A missing `end` is unbounded.
    async fn by_time(
        &self,
        bucket_id: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRecord>>;

    /// Records in `scope` with `after < checkpoint <= until`, ordered by
    /// checkpoint ascending. A missing `until` is unbounded.
    async fn by_checkpoint(
        &self,
        scope: CommitScope<'_>,
        after: i64,
        until: Option<i64>,
    ) -> Result<Vec<CommitRecord>>;

    /// Move every live record of a stream into the recycle partition.
    ///
    /// Recycled records left by an earlier deletion of the same stream are
    /// erased first. Returns the number of records moved.
    async fn retag_stream(&self, bucket_id: &str, stream_id: &str) -> Result<u64>;

    /// Erase recycled records with `checkpoint < bound`. Returns the count.
    async fn delete_recycled_below(&self, bound: i64) -> Result<u64>;

    /// Erase records, optionally only those originating from one bucket.
    async fn purge(&self, bucket_id: Option<&str>) -> Result<()>;

    /// Remove the collection and its indexes entirely.
    async fn drop_all(&self) -> Result<()>;
}
