//! In-memory CommitStore implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::{CommitRecord, RECYCLE_BUCKET};
use crate::storage::{CommitScope, CommitStore, Constraint, InsertError, Result, StorageError};

/// Commit store held in process memory.
///
/// Records are keyed by checkpoint. Inserts take the write lock, so the
/// uniqueness checks and the insert form one atomic step, the same guarantee
/// a document store gives for a single-record insert.
#[derive(Default)]
pub struct MemoryCommitStore {
    commits: RwLock<BTreeMap<i64, CommitRecord>>,
    unavailable: RwLock<bool>,
    range_first: RwLock<bool>,
}

impl MemoryCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the store were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Report stream range violations ahead of commit id violations.
    ///
    /// A document store checks its unique indexes in no promised order; this
    /// switch gives tests the order the default one hides.
    pub async fn set_report_range_first(&self, range_first: bool) {
        *self.range_first.write().await = range_first;
    }

    /// Number of records held, recycled ones included.
    pub async fn len(&self) -> usize {
        self.commits.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.commits.read().await.is_empty()
    }

    async fn check_available(&self) -> Result<()> {
        if *self.unavailable.read().await {
            return Err(StorageError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn same_stream(a: &CommitRecord, b: &CommitRecord) -> bool {
    a.bucket_id == b.bucket_id
        && a.origin_bucket_id == b.origin_bucket_id
        && a.stream_id == b.stream_id
}

/// The constraint `candidate` violates against `existing`, if any.
fn violation(
    existing: &CommitRecord,
    candidate: &CommitRecord,
    range_first: bool,
) -> Option<Constraint> {
    if !same_stream(existing, candidate) {
        return None;
    }
    let same_id = existing.commit_id == candidate.commit_id;
    let same_range = (existing.revision_from == candidate.revision_from
        && existing.revision_to == candidate.revision_to)
        || existing.commit_sequence == candidate.commit_sequence;
    match (same_id, same_range) {
        (true, true) if range_first => Some(Constraint::StreamRange),
        (true, _) => Some(Constraint::CommitId),
        (false, true) => Some(Constraint::StreamRange),
        (false, false) => None,
    }
}

#[async_trait]
impl CommitStore for MemoryCommitStore {
    async fn initialize(&self) -> Result<()> {
        self.check_available().await
    }

    async fn insert(&self, record: &CommitRecord) -> std::result::Result<(), InsertError> {
        self.check_available().await?;
        let mut commits = self.commits.write().await;

        if commits.contains_key(&record.checkpoint) {
            return Err(InsertError::Violation(Constraint::Checkpoint));
        }

        // Commit id violations win over range violations unless the store
        // was switched to report ranges first.
        let range_first = *self.range_first.read().await;
        let preferred = if range_first {
            Constraint::StreamRange
        } else {
            Constraint::CommitId
        };
        let mut found = None;
        for existing in commits.values() {
            match violation(existing, record, range_first) {
                Some(constraint) if constraint == preferred => {
                    found = Some(constraint);
                    break;
                }
                Some(other) => found = found.or(Some(other)),
                None => {}
            }
        }
        if let Some(constraint) = found {
            return Err(InsertError::Violation(constraint));
        }

        commits.insert(record.checkpoint, record.clone());
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
        self.check_available().await?;
        let commits = self.commits.read().await;
        Ok(commits
            .values()
            .find(|c| {
                c.bucket_id == bucket_id
                    && c.origin_bucket_id == bucket_id
                    && c.stream_id == stream_id
                    && (c.commit_sequence == commit_sequence
                        || (c.revision_from == revision_from && c.revision_to == revision_to))
            })
            .cloned())
    }

    async fn max_checkpoint(&self) -> Result<Option<i64>> {
        self.check_available().await?;
        Ok(self.commits.read().await.keys().next_back().copied())
    }

    async fn by_revision(
        &self,
        bucket_id: &str,
        stream_id: &str,
        min_revision: u32,
        max_revision: u32,
    ) -> Result<Vec<CommitRecord>> {
        self.check_available().await?;
        let commits = self.commits.read().await;
        let mut found: Vec<CommitRecord> = commits
            .values()
            .filter(|c| {
                c.bucket_id == bucket_id
                    && c.stream_id == stream_id
                    && c.intersects(min_revision, max_revision)
            })
            .cloned()
            .collect();
        found.sort_by_key(|c| c.revision_from);
        Ok(found)
    }

    async fn by_time(
        &self,
        bucket_id: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRecord>> {
        self.check_available().await?;
        let commits = self.commits.read().await;
        Ok(commits
            .values()
            .filter(|c| {
                c.bucket_id == bucket_id
                    && c.commit_stamp >= start
                    && end.map_or(true, |end| c.commit_stamp < end)
            })
            .cloned()
            .collect())
    }

    async fn by_checkpoint(
        &self,
        scope: CommitScope<'_>,
        after: i64,
        until: Option<i64>,
    ) -> Result<Vec<CommitRecord>> {
        self.check_available().await?;
        let commits = self.commits.read().await;
        Ok(commits
            .range((after.saturating_add(1))..)
            .map(|(_, c)| c)
            .take_while(|c| until.map_or(true, |until| c.checkpoint <= until))
            .filter(|c| match scope {
                CommitScope::Bucket(bucket_id) => c.bucket_id == bucket_id,
                CommitScope::Live => c.bucket_id != RECYCLE_BUCKET,
                CommitScope::Recycled => c.bucket_id == RECYCLE_BUCKET,
            })
            .cloned()
            .collect())
    }

    async fn retag_stream(&self, bucket_id: &str, stream_id: &str) -> Result<u64> {
        self.check_available().await?;
        let mut commits = self.commits.write().await;

        commits.retain(|_, c| {
            !(c.bucket_id == RECYCLE_BUCKET
                && c.origin_bucket_id == bucket_id
                && c.stream_id == stream_id)
        });

        let mut moved = 0;
        for c in commits.values_mut() {
            if c.bucket_id == bucket_id && c.stream_id == stream_id {
                c.bucket_id = RECYCLE_BUCKET.to_string();
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn delete_recycled_below(&self, bound: i64) -> Result<u64> {
        self.check_available().await?;
        let mut commits = self.commits.write().await;
        let before = commits.len();
        commits.retain(|checkpoint, c| !(c.bucket_id == RECYCLE_BUCKET && *checkpoint < bound));
        Ok((before - commits.len()) as u64)
    }

    async fn purge(&self, bucket_id: Option<&str>) -> Result<()> {
        self.check_available().await?;
        let mut commits = self.commits.write().await;
        match bucket_id {
            Some(bucket_id) => {
                commits.retain(|_, c| c.bucket_id != bucket_id && c.origin_bucket_id != bucket_id)
            }
            None => commits.clear(),
        }
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        self.check_available().await?;
        self.commits.write().await.clear();
        Ok(())
    }
}
