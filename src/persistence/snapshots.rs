//! Snapshot writes, reads and the snapshot worklist.

use tracing::{debug, error};

use super::{Persistence, Result};
use crate::model::{Snapshot, SnapshotRecord, StreamHead};
use crate::storage::StorageError;

impl Persistence {
    /// Store a snapshot and reconcile the stream head against it.
    ///
    /// Best effort: returns `Ok(false)` when any step fails, after logging
    /// it. Writing the same revision twice overwrites. Only a disposed
    /// engine returns an error.
    #[tracing::instrument(
        skip_all,
        fields(
            bucket_id = %snapshot.bucket_id,
            stream_id = %snapshot.stream_id,
            stream_revision = snapshot.stream_revision,
        )
    )]
    pub async fn add_snapshot(&self, snapshot: &Snapshot) -> Result<bool> {
        self.ensure_live()?;
        match self.write_snapshot(snapshot).await {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(error = %e, "Snapshot write failed");
                Ok(false)
            }
        }
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> std::result::Result<(), StorageError> {
        let record = SnapshotRecord {
            bucket_id: snapshot.bucket_id.clone(),
            stream_id: snapshot.stream_id.clone(),
            stream_revision: snapshot.stream_revision,
            payload: self.serializer.serialize(&snapshot.payload)?,
        };
        self.stores.snapshots.upsert(&record).await?;

        if !self.stream_heads.is_enabled() {
            return Ok(());
        }

        // Recompute the backlog from the head as stored now; this is what
        // corrects drift from failed or duplicated increments. A stream with
        // no head (deleted, or never written) does not get one from a snapshot.
        let Some(head) = self
            .stores
            .stream_heads
            .get(&snapshot.bucket_id, &snapshot.stream_id)
            .await?
        else {
            debug!("Snapshot stored, stream has no head");
            return Ok(());
        };
        let unsnapshotted = head.head_revision.saturating_sub(snapshot.stream_revision);

        self.stores
            .stream_heads
            .reconcile(
                &snapshot.bucket_id,
                &snapshot.stream_id,
                snapshot.stream_revision,
                unsnapshotted,
            )
            .await?;
        debug!(unsnapshotted, "Snapshot stored");
        Ok(())
    }

    /// Newest snapshot of a stream at or below `max_revision`.
    #[tracing::instrument(skip(self))]
    pub async fn get_snapshot(
        &self,
        bucket_id: &str,
        stream_id: &str,
        max_revision: u32,
    ) -> Result<Option<Snapshot>> {
        self.ensure_live()?;
        let Some(record) = self
            .stores
            .snapshots
            .get_at_or_below(bucket_id, stream_id, max_revision)
            .await?
        else {
            return Ok(None);
        };

        let payload = self.serializer.deserialize(&record.payload)?;
        Ok(Some(Snapshot {
            bucket_id: record.bucket_id,
            stream_id: record.stream_id,
            stream_revision: record.stream_revision,
            payload,
        }))
    }

    /// Streams of a bucket with at least `threshold` unsnapshotted events,
    /// largest backlog first.
    ///
    /// Empty when snapshot support is disabled.
    #[tracing::instrument(skip(self))]
    pub async fn get_streams_to_snapshot(
        &self,
        bucket_id: &str,
        threshold: u32,
    ) -> Result<Vec<StreamHead>> {
        self.ensure_live()?;
        if !self.stream_heads.is_enabled() {
            return Ok(Vec::new());
        }
        Ok(self
            .stores
            .stream_heads
            .streams_to_snapshot(bucket_id, threshold)
            .await?)
    }
}
