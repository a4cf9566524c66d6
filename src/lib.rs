//! Chronicle - durable storage for event-sourced streams
//!
//! Persists immutable batches of events ("commits") per stream, gives every
//! commit a globally ordered checkpoint, and resolves write races through the
//! backing store's uniqueness constraints rather than a lock manager. Stream
//! heads, snapshots and a recycle bin for deleted streams are kept alongside.
//!
//! ```text
//! Persistence ──┬── CommitStore      (commits, checkpoints, recycle bin)
//!               ├── StreamHeadStore  (per-stream summary, snapshot worklist)
//!               └── SnapshotStore    (materialized state by revision)
//! ```

pub mod config;
pub mod model;
pub mod persistence;
pub mod serialization;
pub mod storage;
pub mod utils;

pub use model::{
    Checkpoint, Commit, CommitAttempt, EventMessage, Headers, Snapshot, StreamHead,
    DEFAULT_BUCKET, RECYCLE_BUCKET,
};
pub use persistence::{Persistence, PersistenceError};
pub use serialization::{JsonSerializer, Serializer};
pub use storage::Stores;
