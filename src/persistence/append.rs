//! Commit append protocol.
//!
//! ```text
//! allocate -> insert -> ok                        -> Commit
//!                    -> checkpoint taken          -> reload, allocate again
//!                    -> commit id taken           -> Duplicate
//!                    -> range or sequence taken   -> occupant has our id ? Duplicate : Conflict
//! ```

use tracing::{debug, warn};
use uuid::Uuid;

use super::{Persistence, PersistenceError, Result};
use crate::model::{Checkpoint, Commit, CommitAttempt, CommitRecord};
use crate::storage::{Constraint, InsertError};

/// What to do about a rejected insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    /// Lost a checkpoint race; allocate again.
    Retry,
    Duplicate,
    Conflict,
    /// Look up the record holding the stream position before deciding.
    Inspect,
}

fn resolve_violation(constraint: Constraint) -> Rejection {
    match constraint {
        Constraint::Checkpoint => Rejection::Retry,
        Constraint::CommitId => Rejection::Duplicate,
        Constraint::StreamRange => Rejection::Inspect,
    }
}

/// An occupant carrying our own commit id is this append racing itself.
fn resolve_occupant(commit_id: Uuid, occupant: Option<&CommitRecord>) -> Rejection {
    match occupant {
        Some(occupant) if occupant.commit_id == commit_id => Rejection::Duplicate,
        _ => Rejection::Conflict,
    }
}

fn into_commit(attempt: CommitAttempt, checkpoint: Checkpoint) -> Commit {
    Commit {
        origin_bucket_id: attempt.bucket_id.clone(),
        bucket_id: attempt.bucket_id,
        stream_id: attempt.stream_id,
        stream_revision: attempt.stream_revision,
        commit_id: attempt.commit_id,
        commit_sequence: attempt.commit_sequence,
        commit_stamp: attempt.commit_stamp,
        headers: attempt.headers,
        events: attempt.events,
        checkpoint,
    }
}

impl Persistence {
    /// Durably append a batch of events.
    ///
    /// Returns the persisted commit with its assigned checkpoint, or
    /// `Duplicate` when this commit id was already applied to the stream, or
    /// `Conflict` when another commit holds the requested revisions.
    /// Checkpoint collisions with other writers are retried internally.
    #[tracing::instrument(
        skip_all,
        fields(
            bucket_id = %attempt.bucket_id,
            stream_id = %attempt.stream_id,
            commit_id = %attempt.commit_id,
            stream_revision = attempt.stream_revision,
        )
    )]
    pub async fn commit(&self, attempt: CommitAttempt) -> Result<Commit> {
        self.ensure_live()?;
        attempt.validate()?;

        let events = self.encode(&attempt.events)?;
        let headers = self.encode(&attempt.headers)?;
        let mut record = CommitRecord::from_attempt(&attempt, Checkpoint::ZERO, events, headers);

        let _guard = self.append_lock.lock().await;
        let mut force_reload = false;
        loop {
            self.ensure_live()?;
            let checkpoint = self.checkpoints.peek_next(force_reload).await?;
            record.checkpoint = checkpoint.value();

            let rejection = match self.stores.commits.insert(&record).await {
                Ok(()) => {
                    self.checkpoints.record(checkpoint);
                    self.stream_heads.dispatch(
                        record.bucket_id.clone(),
                        record.stream_id.clone(),
                        record.revision_to,
                        record.event_count,
                    );
                    debug!(%checkpoint, "Commit persisted");
                    return Ok(into_commit(attempt, checkpoint));
                }
                Err(InsertError::Storage(e)) => return Err(e.into()),
                Err(InsertError::Violation(constraint)) => resolve_violation(constraint),
            };

            let rejection = match rejection {
                Rejection::Inspect => {
                    let occupant = self
                        .stores
                        .commits
                        .find_occupant(
                            &record.bucket_id,
                            &record.stream_id,
                            record.commit_sequence,
                            record.revision_from,
                            record.revision_to,
                        )
                        .await?;
                    resolve_occupant(attempt.commit_id, occupant.as_ref())
                }
                other => other,
            };

            match rejection {
                Rejection::Retry => {
                    debug!(%checkpoint, "Checkpoint taken by another writer, reloading");
                    force_reload = true;
                }
                Rejection::Duplicate => {
                    warn!("Duplicate commit rejected");
                    return Err(PersistenceError::duplicate(&attempt));
                }
                Rejection::Conflict | Rejection::Inspect => {
                    warn!("Concurrency conflict");
                    return Err(PersistenceError::conflict(&attempt));
                }
            }
        }
    }
}
