//! Store retry policy: backoff builder and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::persistence::PersistenceError;

/// Backoff while waiting for the store to accept connections.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn store_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// Whether repeating the operation unchanged can succeed.
///
/// Only an unreachable store qualifies. Duplicates and conflicts are final
/// answers about the stream; a conflict is resolved by rebuilding the
/// attempt, not by resending it.
pub fn is_retryable(err: &PersistenceError) -> bool {
    matches!(err, PersistenceError::Unavailable(_))
}
