//! In-memory SnapshotStore implementation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::SnapshotRecord;
use crate::storage::{Result, SnapshotStore, StorageError};

/// Snapshot store held in process memory.
///
/// Per stream, snapshots are ordered by revision so the "newest at or
/// below" lookup is a range query.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<(String, String), BTreeMap<u32, SnapshotRecord>>>,
    fail_on_upsert: RwLock<bool>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `upsert` fail, to exercise the best-effort snapshot contract.
    pub async fn set_fail_on_upsert(&self, fail: bool) {
        *self.fail_on_upsert.write().await = fail;
    }

    pub async fn stored_count(&self) -> usize {
        self.snapshots.read().await.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, record: &SnapshotRecord) -> Result<()> {
        if *self.fail_on_upsert.read().await {
            return Err(StorageError::Fault("snapshot upsert disabled".to_string()));
        }
        let key = (record.bucket_id.clone(), record.stream_id.clone());
        self.snapshots
            .write()
            .await
            .entry(key)
            .or_default()
            .insert(record.stream_revision, record.clone());
        Ok(())
    }

    async fn get_at_or_below(
        &self,
        bucket_id: &str,
        stream_id: &str,
        max_revision: u32,
    ) -> Result<Option<SnapshotRecord>> {
        let key = (bucket_id.to_string(), stream_id.to_string());
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&key)
            .and_then(|revisions| revisions.range(..=max_revision).next_back())
            .map(|(_, record)| record.clone()))
    }

    async fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        let key = (bucket_id.to_string(), stream_id.to_string());
        self.snapshots.write().await.remove(&key);
        Ok(())
    }

    async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        match bucket_id {
            Some(bucket_id) => snapshots.retain(|(b, _), _| b != bucket_id),
            None => snapshots.clear(),
        }
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        self.snapshots.write().await.clear();
        Ok(())
    }
}
