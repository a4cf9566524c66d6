//! Caller-facing error taxonomy.

use uuid::Uuid;

use crate::model::{AttemptError, CommitAttempt};
use crate::storage::StorageError;

/// Result type for persistence engine operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Errors surfaced by the persistence engine.
///
/// Checkpoint collisions never appear here; they are resolved internally.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The commit id was already applied to this stream. Safe to ignore.
    #[error("Duplicate commit {commit_id} on stream {bucket_id}/{stream_id}")]
    Duplicate {
        bucket_id: String,
        stream_id: String,
        commit_id: Uuid,
    },

    /// Another commit holds the requested stream position. Reload the stream
    /// and rebuild the attempt.
    #[error("Concurrency conflict on stream {bucket_id}/{stream_id} at revision {stream_revision}")]
    Conflict {
        bucket_id: String,
        stream_id: String,
        stream_revision: u32,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage fault: {0}")]
    StorageFault(String),

    #[error("Persistence engine has been disposed")]
    Disposed,

    /// The recycle bin bucket was named where a caller bucket is expected.
    /// Recycled commits are read through `get_deleted_commits`.
    #[error("Bucket {0} is reserved for the recycle bin")]
    ReservedBucket(String),

    #[error("Invalid commit attempt: {0}")]
    InvalidAttempt(#[from] AttemptError),
}

impl PersistenceError {
    pub(crate) fn duplicate(attempt: &CommitAttempt) -> Self {
        PersistenceError::Duplicate {
            bucket_id: attempt.bucket_id.clone(),
            stream_id: attempt.stream_id.clone(),
            commit_id: attempt.commit_id,
        }
    }

    pub(crate) fn conflict(attempt: &CommitAttempt) -> Self {
        PersistenceError::Conflict {
            bucket_id: attempt.bucket_id.clone(),
            stream_id: attempt.stream_id.clone(),
            stream_revision: attempt.stream_revision,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PersistenceError::Duplicate { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PersistenceError::Conflict { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PersistenceError::Unavailable(_))
    }
}

impl From<StorageError> for PersistenceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Unavailable(msg) => PersistenceError::Unavailable(msg),
            other => PersistenceError::StorageFault(other.to_string()),
        }
    }
}
