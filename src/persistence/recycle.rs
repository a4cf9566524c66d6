//! Soft delete and the recycle bin lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{Persistence, Result};
use crate::model::{Checkpoint, Commit};
use crate::storage::CommitScope;

impl Persistence {
    /// Soft-delete a stream.
    ///
    /// Its head and snapshots are erased for good. Its commits move to the
    /// recycle bin, where only `get_deleted_commits` sees them until a later
    /// `reclaim` erases them. Commits left in the bin by an earlier deletion
    /// of the same stream are erased first.
    ///
    /// Waits for in-flight appends and head updates from this process, so a
    /// queued update cannot recreate the head afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        self.ensure_live()?;
        self.ensure_user_bucket(bucket_id)?;
        let _guard = self.append_lock.lock().await;
        self.stream_heads.settle().await;

        self.stores.stream_heads.delete(bucket_id, stream_id).await?;
        self.stores
            .snapshots
            .delete_stream(bucket_id, stream_id)
            .await?;
        let recycled = self
            .stores
            .commits
            .retag_stream(bucket_id, stream_id)
            .await?;

        info!(recycled, "Stream deleted");
        Ok(())
    }

    /// Empty the recycle bin up to the last checkpoint issued right now.
    ///
    /// Only recycled commits strictly below that bound are erased, so a
    /// commit written concurrently with or after this call is never touched.
    /// Returns the number of commits erased.
    #[tracing::instrument(skip(self))]
    pub async fn reclaim(&self) -> Result<u64> {
        self.ensure_live()?;
        let bound = self.checkpoints.last_issued().await?;
        let erased = self.stores.commits.delete_recycled_below(bound).await?;
        info!(bound, erased, "Recycle bin reclaimed");
        Ok(erased)
    }

    /// Erase commits, heads and snapshots, optionally of one bucket only.
    ///
    /// Irreversible. Waits for in-flight appends and head updates from this
    /// process.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        self.ensure_live()?;
        let _guard = self.append_lock.lock().await;
        self.stream_heads.settle().await;

        self.stores.commits.purge(bucket_id).await?;
        self.stores.stream_heads.purge(bucket_id).await?;
        self.stores.snapshots.purge(bucket_id).await?;
        self.checkpoints.reset();

        warn!("Storage purged");
        Ok(())
    }

    /// Remove the backing collections and their indexes.
    ///
    /// `initialize` must run again before the engine is used.
    #[tracing::instrument(skip(self))]
    pub async fn drop_storage(&self) -> Result<()> {
        self.ensure_live()?;
        let _guard = self.append_lock.lock().await;
        self.stream_heads.settle().await;
        let mut initialized = self.initialized.lock().await;

        self.stores.commits.drop_all().await?;
        self.stores.stream_heads.drop_all().await?;
        self.stores.snapshots.drop_all().await?;
        self.checkpoints.reset();
        *initialized = false;

        warn!("Storage dropped");
        Ok(())
    }

    /// Commits in the recycle bin, by checkpoint.
    #[tracing::instrument(skip(self))]
    pub async fn get_deleted_commits(&self) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        self.read_by_checkpoint(CommitScope::Recycled, Checkpoint::ZERO, None)
            .await
    }

    /// Run `reclaim` every `interval` until stopped or disposed.
    pub fn spawn_recycler(self: &Arc<Self>, interval: Duration) -> RecyclerHandle {
        let (cancel_tx, mut cancel_rx) = tokio::sync::watch::channel(false);
        let persistence = Arc::clone(self);

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Recycler started");

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if persistence.is_disposed() {
                            info!("Recycler stopped, engine disposed");
                            break;
                        }
                        if let Err(e) = persistence.reclaim().await {
                            error!(error = %e, "Recycle bin reclamation failed");
                        }
                    }
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            info!("Recycler stopped");
                            break;
                        }
                    }
                }
            }
        });

        RecyclerHandle { cancel: cancel_tx }
    }
}

/// Handle to a running recycler task.
pub struct RecyclerHandle {
    cancel: tokio::sync::watch::Sender<bool>,
}

impl RecyclerHandle {
    /// Signal the recycler to stop.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }
}
