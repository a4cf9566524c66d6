//! Value types shared by the persistence engine and storage backends.

mod checkpoint;
mod commit;

pub use checkpoint::{Checkpoint, ParseCheckpointError};
pub use commit::{AttemptError, Commit, CommitAttempt, CommitRecord, EventMessage, Headers};

use serde::{Deserialize, Serialize};

/// Bucket used when callers do not partition their streams.
pub const DEFAULT_BUCKET: &str = "default";

/// Reserved bucket holding soft-deleted commits until they are reclaimed.
///
/// Never accepted as the bucket of a commit attempt.
pub const RECYCLE_BUCKET: &str = ":rb";

/// Denormalized per-stream summary.
///
/// Eventually consistent with the commit log: `head_revision` and
/// `unsnapshotted` are advanced by detached tasks after each append and
/// recomputed exactly whenever a snapshot is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHead {
    pub bucket_id: String,
    pub stream_id: String,
    pub head_revision: u32,
    pub snapshot_revision: u32,
    pub unsnapshotted: u32,
}

/// Materialized stream state at a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bucket_id: String,
    pub stream_id: String,
    pub stream_revision: u32,
    pub payload: serde_json::Value,
}

impl Snapshot {
    pub fn new(
        bucket_id: impl Into<String>,
        stream_id: impl Into<String>,
        stream_revision: u32,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            stream_id: stream_id.into(),
            stream_revision,
            payload,
        }
    }
}

/// Stored shape of a snapshot, payload encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub bucket_id: String,
    pub stream_id: String,
    pub stream_revision: u32,
    pub payload: Vec<u8>,
}
