//! MongoDB implementations of storage interfaces.

mod commit_store;
mod snapshot_store;
mod stream_head_store;

pub use commit_store::MongoCommitStore;
pub use snapshot_store::MongoSnapshotStore;
pub use stream_head_store::MongoStreamHeadStore;

use mongodb::bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};

use crate::storage::{Constraint, InsertError, StorageError};

/// Collection names.
pub(crate) const COMMITS_COLLECTION: &str = "commits";
pub(crate) const STREAM_HEADS_COLLECTION: &str = "stream_heads";
pub(crate) const SNAPSHOTS_COLLECTION: &str = "snapshots";

/// Unique index names, matched against duplicate key messages.
pub(crate) const CHECKPOINT_INDEX: &str = "_id_";
pub(crate) const COMMIT_ID_INDEX: &str = "commit_id_unique";
pub(crate) const STREAM_RANGE_INDEX: &str = "stream_range_unique";
pub(crate) const COMMIT_SEQUENCE_INDEX: &str = "commit_sequence_unique";

/// MongoDB duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Collection "ns not found" code, returned when dropping a missing collection.
const NAMESPACE_NOT_FOUND: i32 = 26;

impl From<mongodb::error::Error> for StorageError {
    fn from(e: mongodb::error::Error) -> Self {
        match *e.kind {
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => StorageError::Unavailable(e.to_string()),
            _ => StorageError::Fault(e.to_string()),
        }
    }
}

/// Map a duplicate key message to the constraint whose index fired.
pub(crate) fn constraint_for(message: &str) -> Option<Constraint> {
    let fired = |index: &str| message.contains(&format!("index: {} ", index));
    if fired(COMMIT_ID_INDEX) {
        Some(Constraint::CommitId)
    } else if fired(STREAM_RANGE_INDEX) || fired(COMMIT_SEQUENCE_INDEX) {
        Some(Constraint::StreamRange)
    } else if fired(CHECKPOINT_INDEX) {
        Some(Constraint::Checkpoint)
    } else {
        None
    }
}

/// Classify an insert failure: duplicate keys become constraint violations,
/// everything else is a storage error.
pub(crate) fn classify_insert_error(e: mongodb::error::Error) -> InsertError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_err)) = *e.kind {
        if write_err.code == DUPLICATE_KEY {
            if let Some(constraint) = constraint_for(&write_err.message) {
                return InsertError::Violation(constraint);
            }
        }
    }
    InsertError::Storage(StorageError::from(e))
}

/// Whether a drop failed only because the collection did not exist.
pub(crate) fn is_namespace_not_found(e: &mongodb::error::Error) -> bool {
    matches!(*e.kind, ErrorKind::Command(ref command) if command.code == NAMESPACE_NOT_FOUND)
}

pub(crate) fn corrupt(field: &str, e: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt(format!("{}: {}", field, e))
}

pub(crate) fn read_u32(doc: &Document, field: &str) -> Result<u32, StorageError> {
    let value = doc.get_i64(field).map_err(|e| corrupt(field, e))?;
    u32::try_from(value).map_err(|e| corrupt(field, e))
}
