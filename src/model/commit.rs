//! Commit types: attempts coming in, commits going out, records at rest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Checkpoint, RECYCLE_BUCKET};

/// Commit or event headers.
pub type Headers = BTreeMap<String, serde_json::Value>;

/// A single domain event inside a commit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub headers: Headers,
    pub body: serde_json::Value,
}

impl EventMessage {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            headers: Headers::new(),
            body,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }
}

/// Reasons a commit attempt is rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("bucket id must not be empty")]
    EmptyBucket,

    #[error("bucket id {0:?} is reserved")]
    ReservedBucket(String),

    #[error("stream id must not be empty")]
    EmptyStream,

    #[error("commit must contain at least one event")]
    NoEvents,

    #[error("commit id must not be nil")]
    NilCommitId,

    #[error("commit sequence must be at least 1")]
    InvalidSequence,

    #[error("stream revision {revision} cannot hold {events} events")]
    InvalidRevision { revision: u32, events: usize },
}

/// A caller's request to append a batch of events to a stream.
///
/// `stream_revision` is the revision of the last event in the batch; the
/// batch therefore occupies `[stream_revision - events.len() + 1, stream_revision]`.
/// A retried client operation must reuse the same `commit_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitAttempt {
    pub bucket_id: String,
    pub stream_id: String,
    pub stream_revision: u32,
    pub commit_id: Uuid,
    pub commit_sequence: u32,
    pub commit_stamp: DateTime<Utc>,
    pub headers: Headers,
    pub events: Vec<EventMessage>,
}

impl CommitAttempt {
    pub fn new(
        bucket_id: impl Into<String>,
        stream_id: impl Into<String>,
        stream_revision: u32,
        commit_id: Uuid,
        commit_sequence: u32,
        events: Vec<EventMessage>,
    ) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            stream_id: stream_id.into(),
            stream_revision,
            commit_id,
            commit_sequence,
            commit_stamp: Utc::now(),
            headers: Headers::new(),
            events,
        }
    }

    pub fn with_commit_stamp(mut self, commit_stamp: DateTime<Utc>) -> Self {
        self.commit_stamp = commit_stamp;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    /// First revision covered by this attempt.
    pub fn revision_from(&self) -> u32 {
        self.stream_revision.saturating_add(1).saturating_sub(self.events.len() as u32)
    }

    /// Check the attempt is well formed.
    pub fn validate(&self) -> Result<(), AttemptError> {
        if self.bucket_id.is_empty() {
            return Err(AttemptError::EmptyBucket);
        }
        if self.bucket_id == RECYCLE_BUCKET {
            return Err(AttemptError::ReservedBucket(self.bucket_id.clone()));
        }
        if self.stream_id.is_empty() {
            return Err(AttemptError::EmptyStream);
        }
        if self.events.is_empty() {
            return Err(AttemptError::NoEvents);
        }
        if self.commit_id.is_nil() {
            return Err(AttemptError::NilCommitId);
        }
        if self.commit_sequence == 0 {
            return Err(AttemptError::InvalidSequence);
        }
        if self.stream_revision == 0 || (self.stream_revision as usize) < self.events.len() {
            return Err(AttemptError::InvalidRevision {
                revision: self.stream_revision,
                events: self.events.len(),
            });
        }
        Ok(())
    }
}

/// A persisted commit as returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// Current bucket; the recycle sentinel once the stream has been deleted.
    pub bucket_id: String,
    /// Bucket the commit was originally appended to.
    pub origin_bucket_id: String,
    pub stream_id: String,
    pub stream_revision: u32,
    pub commit_id: Uuid,
    pub commit_sequence: u32,
    pub commit_stamp: DateTime<Utc>,
    pub headers: Headers,
    pub events: Vec<EventMessage>,
    pub checkpoint: Checkpoint,
}

impl Commit {
    /// First revision covered by this commit.
    pub fn revision_from(&self) -> u32 {
        self.stream_revision.saturating_add(1).saturating_sub(self.events.len() as u32)
    }

    /// True once the commit has been moved to the recycle partition.
    pub fn is_recycled(&self) -> bool {
        self.bucket_id == RECYCLE_BUCKET
    }
}

/// The stored shape of a commit: identity, ordering and range keys in the
/// clear, payload already encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub bucket_id: String,
    pub origin_bucket_id: String,
    pub stream_id: String,
    pub commit_sequence: u32,
    pub checkpoint: i64,
    pub commit_id: Uuid,
    pub revision_from: u32,
    pub revision_to: u32,
    pub commit_stamp: DateTime<Utc>,
    pub event_count: u32,
    pub events: Vec<u8>,
    pub headers: Vec<u8>,
}

impl CommitRecord {
    /// Build the record for an attempt at a candidate checkpoint.
    pub fn from_attempt(
        attempt: &CommitAttempt,
        checkpoint: Checkpoint,
        events: Vec<u8>,
        headers: Vec<u8>,
    ) -> Self {
        Self {
            bucket_id: attempt.bucket_id.clone(),
            origin_bucket_id: attempt.bucket_id.clone(),
            stream_id: attempt.stream_id.clone(),
            commit_sequence: attempt.commit_sequence,
            checkpoint: checkpoint.value(),
            commit_id: attempt.commit_id,
            revision_from: attempt.revision_from(),
            revision_to: attempt.stream_revision,
            commit_stamp: attempt.commit_stamp,
            event_count: attempt.events.len() as u32,
            events,
            headers,
        }
    }

    /// Whether this record's revision range intersects `[min, max]`.
    pub fn intersects(&self, min_revision: u32, max_revision: u32) -> bool {
        self.revision_from <= max_revision && self.revision_to >= min_revision
    }
}
