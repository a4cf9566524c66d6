//! MongoDB CommitStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{doc, Binary, Document};
use mongodb::options::{FindOneOptions, FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use tracing::debug;
use uuid::Uuid;

use crate::model::{CommitRecord, RECYCLE_BUCKET};
use crate::storage::{CommitScope, CommitStore, InsertError, Result, StorageError};

use super::{
    classify_insert_error, corrupt, is_namespace_not_found, read_u32, COMMITS_COLLECTION,
    COMMIT_ID_INDEX, COMMIT_SEQUENCE_INDEX, STREAM_RANGE_INDEX,
};

/// MongoDB implementation of CommitStore.
///
/// The checkpoint is the document `_id`, so the checkpoint constraint is the
/// primary key. The remaining constraints are named unique indexes, which
/// lets duplicate key errors be traced back to the constraint that fired.
pub struct MongoCommitStore {
    commits: Collection<Document>,
}

impl MongoCommitStore {
    pub fn new(database: &Database) -> Self {
        Self {
            commits: database.collection(COMMITS_COLLECTION),
        }
    }

    async fn collect(&self, filter: Document, sort: Document) -> Result<Vec<CommitRecord>> {
        let options = FindOptions::builder().sort(sort).build();
        let mut cursor = self.commits.find(filter).with_options(options).await?;

        let mut records = Vec::new();
        while cursor.advance().await? {
            let doc = cursor.deserialize_current()?;
            records.push(from_document(&doc)?);
        }
        Ok(records)
    }
}

fn unique_index(name: &str, keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .unique(true)
                .name(name.to_string())
                .build(),
        )
        .build()
}

fn to_document(record: &CommitRecord) -> Document {
    doc! {
        "_id": record.checkpoint,
        "bucket_id": &record.bucket_id,
        "origin_bucket_id": &record.origin_bucket_id,
        "stream_id": &record.stream_id,
        "commit_id": record.commit_id.to_string(),
        "commit_sequence": record.commit_sequence as i64,
        "revision_from": record.revision_from as i64,
        "revision_to": record.revision_to as i64,
        "commit_stamp": mongodb::bson::DateTime::from_millis(record.commit_stamp.timestamp_millis()),
        "event_count": record.event_count as i64,
        "events": Binary { subtype: BinarySubtype::Generic, bytes: record.events.clone() },
        "headers": Binary { subtype: BinarySubtype::Generic, bytes: record.headers.clone() },
    }
}

fn from_document(doc: &Document) -> Result<CommitRecord> {
    let text = |field: &str| -> Result<String> {
        doc.get_str(field)
            .map(str::to_string)
            .map_err(|e| corrupt(field, e))
    };
    let bytes = |field: &str| -> Result<Vec<u8>> {
        doc.get_binary_generic(field)
            .cloned()
            .map_err(|e| corrupt(field, e))
    };

    let commit_id = Uuid::parse_str(&text("commit_id")?).map_err(|e| corrupt("commit_id", e))?;
    let millis = doc
        .get_datetime("commit_stamp")
        .map_err(|e| corrupt("commit_stamp", e))?
        .timestamp_millis();
    let commit_stamp = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Corrupt(format!("commit_stamp out of range: {}", millis)))?;

    Ok(CommitRecord {
        bucket_id: text("bucket_id")?,
        origin_bucket_id: text("origin_bucket_id")?,
        stream_id: text("stream_id")?,
        commit_sequence: read_u32(doc, "commit_sequence")?,
        checkpoint: doc.get_i64("_id").map_err(|e| corrupt("_id", e))?,
        commit_id,
        revision_from: read_u32(doc, "revision_from")?,
        revision_to: read_u32(doc, "revision_to")?,
        commit_stamp,
        event_count: read_u32(doc, "event_count")?,
        events: bytes("events")?,
        headers: bytes("headers")?,
    })
}

fn scope_filter(scope: CommitScope<'_>) -> Document {
    match scope {
        CommitScope::Bucket(bucket_id) => doc! { "bucket_id": bucket_id },
        CommitScope::Live => doc! { "bucket_id": { "$ne": RECYCLE_BUCKET } },
        CommitScope::Recycled => doc! { "bucket_id": RECYCLE_BUCKET },
    }
}

#[async_trait]
impl CommitStore for MongoCommitStore {
    async fn initialize(&self) -> Result<()> {
        let indexes = vec![
            unique_index(
                COMMIT_ID_INDEX,
                doc! { "bucket_id": 1, "origin_bucket_id": 1, "stream_id": 1, "commit_id": 1 },
            ),
            unique_index(
                STREAM_RANGE_INDEX,
                doc! {
                    "bucket_id": 1,
                    "origin_bucket_id": 1,
                    "stream_id": 1,
                    "revision_from": 1,
                    "revision_to": 1,
                },
            ),
            unique_index(
                COMMIT_SEQUENCE_INDEX,
                doc! { "bucket_id": 1, "origin_bucket_id": 1, "stream_id": 1, "commit_sequence": 1 },
            ),
            // Checkpoint reads within a bucket
            IndexModel::builder()
                .keys(doc! { "bucket_id": 1, "_id": 1 })
                .build(),
            // Temporal reads within a bucket
            IndexModel::builder()
                .keys(doc! { "bucket_id": 1, "commit_stamp": 1 })
                .build(),
            // Revision range reads within a stream
            IndexModel::builder()
                .keys(doc! { "bucket_id": 1, "stream_id": 1, "revision_to": 1 })
                .build(),
        ];

        self.commits.create_indexes(indexes).await?;
        debug!(collection = COMMITS_COLLECTION, "Commit indexes ensured");
        Ok(())
    }

    async fn insert(&self, record: &CommitRecord) -> std::result::Result<(), InsertError> {
        self.commits
            .insert_one(to_document(record))
            .await
            .map_err(classify_insert_error)?;
        Ok(())
    }

    async fn find_occupant(
        &self,
        bucket_id: &str,
        stream_id: &str,
        commit_sequence: u32,
        revision_from: u32,
        revision_to: u32,
    ) -> Result<Option<CommitRecord>> {
        let filter = doc! {
            "bucket_id": bucket_id,
            "origin_bucket_id": bucket_id,
            "stream_id": stream_id,
            "$or": [
                { "commit_sequence": commit_sequence as i64 },
                { "revision_from": revision_from as i64, "revision_to": revision_to as i64 },
            ],
        };

        match self.commits.find_one(filter).await? {
            Some(doc) => Ok(Some(from_document(&doc)?)),
            None => Ok(None),
        }
    }

    async fn max_checkpoint(&self) -> Result<Option<i64>> {
        let options = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
        let found = self.commits.find_one(doc! {}).with_options(options).await?;

        match found {
            Some(doc) => Ok(Some(doc.get_i64("_id").map_err(|e| corrupt("_id", e))?)),
            None => Ok(None),
        }
    }

    async fn by_revision(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<CommitRecord>> {
        let filter = doc! {
            "bucket_id": bucket_id,
            "stream_id": stream_id,
            "revision_to": { "$gte": min_revision as i64 },
            "revision_from": { "$lte": max_revision as i64 },
        };
        self.collect(filter, doc! { "revision_from": 1 }).await
    }

    async fn by_time(
        &self,
        bucket_id: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRecord>> {
        let mut range =
            doc! { "$gte": mongodb::bson::DateTime::from_millis(start.timestamp_millis()) };
        if let Some(end) = end {
            range.insert(
                "$lt",
                mongodb::bson::DateTime::from_millis(end.timestamp_millis()),
            );
        }
        let filter = doc! { "bucket_id": bucket_id, "commit_stamp": range };
        self.collect(filter, doc! { "_id": 1 }).await
    }

    async fn by_checkpoint(
        &self,
        scope: CommitScope<'_>,
        after: i64,
        until: Option<i64>,
    ) -> Result<Vec<CommitRecord>> {
        let mut range = doc! { "$gt": after };
        if let Some(until) = until {
            range.insert("$lte", until);
        }
        let mut filter = scope_filter(scope);
        filter.insert("_id", range);
        self.collect(filter, doc! { "_id": 1 }).await
    }

    async fn retag_stream(&self, bucket_id: &str, stream_id: &str) -> Result<u64> {
        let evicted = self
            .commits
            .delete_many(doc! {
                "bucket_id": RECYCLE_BUCKET,
                "origin_bucket_id": bucket_id,
                "stream_id": stream_id,
            })
            .await?;
        if evicted.deleted_count > 0 {
            debug!(
                bucket_id,
                stream_id,
                evicted = evicted.deleted_count,
                "Evicted earlier recycled generation"
            );
        }

        let moved = self
            .commits
            .update_many(
                doc! { "bucket_id": bucket_id, "stream_id": stream_id },
                doc! { "$set": { "bucket_id": RECYCLE_BUCKET } },
            )
            .await?;
        Ok(moved.modified_count)
    }

    async fn delete_recycled_below(&self, bound: i64) -> Result<u64> {
        let result = self
            .commits
            .delete_many(doc! { "bucket_id": RECYCLE_BUCKET, "_id": { "$lt": bound } })
            .await?;
        Ok(result.deleted_count)
    }

    async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        let filter = match bucket_id {
            Some(bucket_id) => doc! {
                "$or": [ { "bucket_id": bucket_id }, { "origin_bucket_id": bucket_id } ],
            },
            None => doc! {},
        };
        self.commits.delete_many(filter).await?;
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        match self.commits.drop().await {
            Ok(()) => Ok(()),
            Err(e) if is_namespace_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
