//! In-memory StreamHeadStore implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::StreamHead;
use crate::storage::{Result, StorageError, StreamHeadStore};

/// Key type: (bucket, stream).
type HeadKey = (String, String);

/// Stream head store held in process memory.
#[derive(Default)]
pub struct MemoryStreamHeadStore {
    heads: RwLock<HashMap<HeadKey, StreamHead>>,
    fail_on_increment: RwLock<bool>,
}

impl MemoryStreamHeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `increment` fail, to exercise the detached update path.
    pub async fn set_fail_on_increment(&self, fail: bool) {
        *self.fail_on_increment.write().await = fail;
    }
}

fn key(bucket_id: &str, stream_id: &str) -> HeadKey {
    (bucket_id.to_string(), stream_id.to_string())
}

fn empty_head(bucket_id: &str, stream_id: &str) -> StreamHead {
    StreamHead {
        bucket_id: bucket_id.to_string(),
        stream_id: stream_id.to_string(),
        head_revision: 0,
        snapshot_revision: 0,
        unsnapshotted: 0,
    }
}

#[async_trait]
impl StreamHeadStore for MemoryStreamHeadStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn increment(
        &self,
        bucket_id: &str,
        stream_id: &str,
        head_revision: u32,
        event_count: u32,
    ) -> Result<()> {
        if *self.fail_on_increment.read().await {
            return Err(StorageError::Unavailable(
                "stream head increment disabled".to_string(),
            ));
        }
        let mut heads = self.heads.write().await;
        let head = heads
            .entry(key(bucket_id, stream_id))
            .or_insert_with(|| empty_head(bucket_id, stream_id));
        head.head_revision = head.head_revision.max(head_revision);
        head.unsnapshotted = head.unsnapshotted.saturating_add(event_count);
        Ok(())
    }

    async fn get(&self, bucket_id: &str, stream_id: &str) -> Result<Option<StreamHead>> {
        let heads = self.heads.read().await;
        Ok(heads.get(&key(bucket_id, stream_id)).cloned())
    }

    async fn reconcile(
        &self,
        bucket_id: &str,
        stream_id: &str,
        snapshot_revision: u32,
        unsnapshotted: u32,
    ) -> Result<()> {
        let mut heads = self.heads.write().await;
        let head = heads
            .entry(key(bucket_id, stream_id))
            .or_insert_with(|| empty_head(bucket_id, stream_id));
        head.head_revision = head.head_revision.max(snapshot_revision);
        head.snapshot_revision = snapshot_revision;
        head.unsnapshotted = unsnapshotted;
        Ok(())
    }

    async fn delete(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        self.heads.write().await.remove(&key(bucket_id, stream_id));
        Ok(())
    }

    async fn streams_to_snapshot(
        &self,
        bucket_id: &str,
        threshold: u32,
    ) -> Result<Vec<StreamHead>> {
        let heads = self.heads.read().await;
        let mut found: Vec<StreamHead> = heads
            .values()
            .filter(|h| h.bucket_id == bucket_id && h.unsnapshotted >= threshold)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.unsnapshotted
                .cmp(&a.unsnapshotted)
                .then_with(|| a.stream_id.cmp(&b.stream_id))
        });
        Ok(found)
    }

    async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        let mut heads = self.heads.write().await;
        match bucket_id {
            Some(bucket_id) => heads.retain(|(b, _), _| b != bucket_id),
            None => heads.clear(),
        }
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        self.heads.write().await.clear();
        Ok(())
    }
}
