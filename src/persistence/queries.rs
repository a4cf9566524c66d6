//! Ordered reads over the commit log.

use chrono::{DateTime, Utc};

use super::{Persistence, Result};
use crate::model::{Checkpoint, Commit, CommitRecord, EventMessage, Headers};
use crate::storage::{CommitScope, StorageError};

impl Persistence {
    /// Commits of a stream whose revisions intersect
    /// `[min_revision, max_revision]`, by first revision.
    #[tracing::instrument(skip(self))]
    pub async fn get_from(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        self.ensure_user_bucket(bucket_id)?;
        let records = self
            .stores
            .commits
            .by_revision(bucket_id, stream_id, min_revision, max_revision)
            .await?;
        self.to_commits(records)
    }

    /// Commits of a bucket stamped at or after `start`, by checkpoint.
    #[tracing::instrument(skip(self))]
    pub async fn get_from_time(
        &self,
        bucket_id: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        self.ensure_user_bucket(bucket_id)?;
        let records = self.stores.commits.by_time(bucket_id, start, None).await?;
        self.to_commits(records)
    }

    /// Commits of a bucket stamped in `[start, end)`, by checkpoint.
    #[tracing::instrument(skip(self))]
    pub async fn get_from_to_time(
        &self,
        bucket_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        self.ensure_user_bucket(bucket_id)?;
        let records = self
            .stores
            .commits
            .by_time(bucket_id, start, Some(end))
            .await?;
        self.to_commits(records)
    }

    /// Commits of a bucket after `cursor`, by checkpoint.
    ///
    /// The recycle bin bucket is rejected with `ReservedBucket`.
    #[tracing::instrument(skip(self))]
    pub async fn get_from_checkpoint(
        &self,
        bucket_id: &str,
        cursor: Checkpoint,
    ) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        self.ensure_user_bucket(bucket_id)?;
        self.read_by_checkpoint(CommitScope::Bucket(bucket_id), cursor, None)
            .await
    }

    /// Commits of every bucket after `cursor`, by checkpoint. Deleted streams
    /// are excluded.
    #[tracing::instrument(skip(self))]
    pub async fn get_from_checkpoint_all(&self, cursor: Checkpoint) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        self.read_by_checkpoint(CommitScope::Live, cursor, None)
            .await
    }

    /// Commits in `(from, to]`, by checkpoint, of one bucket or of every
    /// bucket except the recycle bin.
    #[tracing::instrument(skip(self))]
    pub async fn get_from_to_checkpoint(
        &self,
        bucket_id: Option<&str>,
        from: Checkpoint,
        to: Checkpoint,
    ) -> Result<Vec<Commit>> {
        self.ensure_live()?;
        if let Some(bucket_id) = bucket_id {
            self.ensure_user_bucket(bucket_id)?;
        }
        let scope = bucket_id.map_or(CommitScope::Live, CommitScope::Bucket);
        self.read_by_checkpoint(scope, from, Some(to)).await
    }

    pub(super) async fn read_by_checkpoint(
        &self,
        scope: CommitScope<'_>,
        after: Checkpoint,
        until: Option<Checkpoint>,
    ) -> Result<Vec<Commit>> {
        let records = self
            .stores
            .commits
            .by_checkpoint(scope, after.value(), until.map(Checkpoint::value))
            .await?;
        self.to_commits(records)
    }

    fn to_commits(&self, records: Vec<CommitRecord>) -> Result<Vec<Commit>> {
        records
            .into_iter()
            .map(|record| self.to_commit(record).map_err(Into::into))
            .collect()
    }

    fn to_commit(&self, record: CommitRecord) -> std::result::Result<Commit, StorageError> {
        let events: Vec<EventMessage> = self.decode(&record.events)?;
        let headers: Headers = self.decode(&record.headers)?;

        Ok(Commit {
            bucket_id: record.bucket_id,
            origin_bucket_id: record.origin_bucket_id,
            stream_id: record.stream_id,
            stream_revision: record.revision_to,
            commit_id: record.commit_id,
            commit_sequence: record.commit_sequence,
            commit_stamp: record.commit_stamp,
            headers,
            events,
            checkpoint: Checkpoint::new(record.checkpoint),
        })
    }
}
