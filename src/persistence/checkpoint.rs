//! Checkpoint allocation.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::model::Checkpoint;
use crate::storage::{self, CommitStore};

/// Cache value meaning "nothing loaded yet".
const EMPTY: i64 = -1;

/// Hands out candidate checkpoints.
///
/// A candidate is not a reservation: another writer, in this process or any
/// other, may insert at the same checkpoint first. The store's checkpoint
/// uniqueness decides, and the loser reloads and tries again.
pub struct CheckpointAllocator {
    commits: Arc<dyn CommitStore>,
    last: AtomicI64,
}

impl CheckpointAllocator {
    pub fn new(commits: Arc<dyn CommitStore>) -> Self {
        Self {
            commits,
            last: AtomicI64::new(EMPTY),
        }
    }

    /// Next candidate checkpoint.
    ///
    /// Reads the store when `force_reload` is set or nothing is cached.
    pub async fn peek_next(&self, force_reload: bool) -> storage::Result<Checkpoint> {
        let mut last = self.last.load(Ordering::Acquire);
        if force_reload || last == EMPTY {
            last = self.last_issued().await?;
            self.last.store(last, Ordering::Release);
            debug!(last_checkpoint = last, "Checkpoint cache reloaded");
        }
        Ok(Checkpoint::new(last + 1))
    }

    /// Highest checkpoint in the store, recycled commits included. Zero when
    /// the store is empty.
    pub async fn last_issued(&self) -> storage::Result<i64> {
        Ok(self.commits.max_checkpoint().await?.unwrap_or(0))
    }

    /// Remember a checkpoint that was just written.
    pub fn record(&self, checkpoint: Checkpoint) {
        self.last.fetch_max(checkpoint.value(), Ordering::AcqRel);
    }

    /// Forget the cached value.
    pub fn reset(&self) {
        self.last.store(EMPTY, Ordering::Release);
    }

    /// Cached last checkpoint, if one is loaded.
    pub fn cached(&self) -> Option<i64> {
        match self.last.load(Ordering::Acquire) {
            EMPTY => None,
            value => Some(value),
        }
    }
}
