//! In-memory storage implementations.
//!
//! Behave like the document store the persistence engine expects: atomic
//! single-record inserts with the commit uniqueness constraints enforced.
//! Used by tests and for local runs without a database.

mod commit_store;
mod snapshot_store;
mod stream_head_store;

pub use commit_store::MemoryCommitStore;
pub use snapshot_store::MemorySnapshotStore;
pub use stream_head_store::MemoryStreamHeadStore;
