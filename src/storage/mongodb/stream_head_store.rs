//! MongoDB StreamHeadStore implementation.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};

use crate::model::StreamHead;
use crate::storage::{Result, StreamHeadStore};

use super::{corrupt, is_namespace_not_found, read_u32, STREAM_HEADS_COLLECTION};

/// MongoDB implementation of StreamHeadStore.
///
/// Both update paths are single upserts using `$max`/`$inc`/`$set`, so
/// concurrent detached updates never lose increments.
pub struct MongoStreamHeadStore {
    heads: Collection<Document>,
}

impl MongoStreamHeadStore {
    pub fn new(database: &Database) -> Self {
        Self {
            heads: database.collection(STREAM_HEADS_COLLECTION),
        }
    }
}

fn key(bucket_id: &str, stream_id: &str) -> Document {
    doc! { "bucket_id": bucket_id, "stream_id": stream_id }
}

fn from_document(doc: &Document) -> Result<StreamHead> {
    let text = |field: &str| -> Result<String> {
        doc.get_str(field)
            .map(str::to_string)
            .map_err(|e| corrupt(field, e))
    };

    Ok(StreamHead {
        bucket_id: text("bucket_id")?,
        stream_id: text("stream_id")?,
        head_revision: read_u32(doc, "head_revision")?,
        snapshot_revision: read_u32(doc, "snapshot_revision")?,
        unsnapshotted: read_u32(doc, "unsnapshotted")?,
    })
}

fn upsert() -> UpdateOptions {
    UpdateOptions::builder().upsert(true).build()
}

#[async_trait]
impl StreamHeadStore for MongoStreamHeadStore {
    async fn initialize(&self) -> Result<()> {
        let key_index = IndexModel::builder()
            .keys(doc! { "bucket_id": 1, "stream_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let backlog_index = IndexModel::builder()
            .keys(doc! { "bucket_id": 1, "unsnapshotted": -1 })
            .build();

        self.heads
            .create_indexes(vec![key_index, backlog_index])
            .await?;
        Ok(())
    }

    async fn increment(
        &self,
        bucket_id: &str,
        stream_id: &str,
        head_revision: u32,
        event_count: u32,
    ) -> Result<()> {
        let update = doc! {
            "$max": { "head_revision": head_revision as i64 },
            "$inc": { "unsnapshotted": event_count as i64 },
            "$setOnInsert": { "snapshot_revision": 0_i64 },
        };
        self.heads
            .update_one(key(bucket_id, stream_id), update)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn get(&self, bucket_id: &str, stream_id: &str) -> Result<Option<StreamHead>> {
        match self.heads.find_one(key(bucket_id, stream_id)).await? {
            Some(doc) => Ok(Some(from_document(&doc)?)),
            None => Ok(None),
        }
    }

    async fn reconcile(
        &self,
        bucket_id: &str,
        stream_id: &str,
        snapshot_revision: u32,
        unsnapshotted: u32,
    ) -> Result<()> {
        let update = doc! {
            "$set": {
                "snapshot_revision": snapshot_revision as i64,
                "unsnapshotted": unsnapshotted as i64,
            },
            "$max": { "head_revision": snapshot_revision as i64 },
        };
        self.heads
            .update_one(key(bucket_id, stream_id), update)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn delete(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        self.heads.delete_one(key(bucket_id, stream_id)).await?;
        Ok(())
    }

    async fn streams_to_snapshot(
        &self,
        bucket_id: &str,
        threshold: u32,
    ) -> Result<Vec<StreamHead>> {
        let filter = doc! {
            "bucket_id": bucket_id,
            "unsnapshotted": { "$gte": threshold as i64 },
        };
        let options = FindOptions::builder()
            .sort(doc! { "unsnapshotted": -1, "stream_id": 1 })
            .build();

        let mut cursor = self.heads.find(filter).with_options(options).await?;
        let mut heads = Vec::new();
        while cursor.advance().await? {
            let doc = cursor.deserialize_current()?;
            heads.push(from_document(&doc)?);
        }
        Ok(heads)
    }

    async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        let filter = match bucket_id {
            Some(bucket_id) => doc! { "bucket_id": bucket_id },
            None => doc! {},
        };
        self.heads.delete_many(filter).await?;
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        match self.heads.drop().await {
            Ok(()) => Ok(()),
            Err(e) if is_namespace_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
