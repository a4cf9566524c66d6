//! MongoDB SnapshotStore implementation.

use async_trait::async_trait;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{doc, Binary, Document};
use mongodb::options::{FindOneOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};

use crate::model::SnapshotRecord;
use crate::storage::{Result, SnapshotStore};

use super::{corrupt, is_namespace_not_found, read_u32, SNAPSHOTS_COLLECTION};

/// MongoDB implementation of SnapshotStore.
pub struct MongoSnapshotStore {
    snapshots: Collection<Document>,
}

impl MongoSnapshotStore {
    pub fn new(database: &Database) -> Self {
        Self {
            snapshots: database.collection(SNAPSHOTS_COLLECTION),
        }
    }
}

fn from_document(doc: &Document) -> Result<SnapshotRecord> {
    let text = |field: &str| -> Result<String> {
        doc.get_str(field)
            .map(str::to_string)
            .map_err(|e| corrupt(field, e))
    };

    Ok(SnapshotRecord {
        bucket_id: text("bucket_id")?,
        stream_id: text("stream_id")?,
        stream_revision: read_u32(doc, "stream_revision")?,
        payload: doc
            .get_binary_generic("payload")
            .cloned()
            .map_err(|e| corrupt("payload", e))?,
    })
}

#[async_trait]
impl SnapshotStore for MongoSnapshotStore {
    async fn initialize(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "bucket_id": 1, "stream_id": 1, "stream_revision": -1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.snapshots.create_index(index).await?;
        Ok(())
    }

    async fn upsert(&self, record: &SnapshotRecord) -> Result<()> {
        let filter = doc! {
            "bucket_id": &record.bucket_id,
            "stream_id": &record.stream_id,
            "stream_revision": record.stream_revision as i64,
        };
        let update = doc! {
            "$set": {
                "payload": Binary { subtype: BinarySubtype::Generic, bytes: record.payload.clone() },
            },
        };
        let options = UpdateOptions::builder().upsert(true).build();

        self.snapshots
            .update_one(filter, update)
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn get_at_or_below(
        &self,
        bucket_id: &str,
        stream_id: &str,
        max_revision: u32,
    ) -> Result<Option<SnapshotRecord>> {
        let filter = doc! {
            "bucket_id": bucket_id,
            "stream_id": stream_id,
            "stream_revision": { "$lte": max_revision as i64 },
        };
        let options = FindOneOptions::builder()
            .sort(doc! { "stream_revision": -1 })
            .build();

        match self.snapshots.find_one(filter).with_options(options).await? {
            Some(doc) => Ok(Some(from_document(&doc)?)),
            None => Ok(None),
        }
    }

    async fn delete_stream(&self, bucket_id: &str, stream_id: &str) -> Result<()> {
        self.snapshots
            .delete_many(doc! { "bucket_id": bucket_id, "stream_id": stream_id })
            .await?;
        Ok(())
    }

    async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        let filter = match bucket_id {
            Some(bucket_id) => doc! { "bucket_id": bucket_id },
            None => doc! {},
        };
        self.snapshots.delete_many(filter).await?;
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        match self.snapshots.drop().await {
            Ok(()) => Ok(()),
            Err(e) if is_namespace_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
