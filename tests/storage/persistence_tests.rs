//! Persistence contract tests.
//!
//! These tests verify the behavior of the persistence engine against a
//! storage backend. Each backend module builds an engine and runs them.
//!
//! Every test works in its own `test_`-prefixed bucket and only asserts on
//! data it wrote, so the suite can run against a shared database.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use chronicle::{Checkpoint, CommitAttempt, EventMessage, Persistence, Snapshot};

/// A bucket name no other test run uses.
pub fn unique_bucket(name: &str) -> String {
    format!("test_{}_{}", name, Uuid::new_v4().simple())
}

/// Attempt appending `count` events ending at `revision`.
pub fn make_attempt(
    bucket: &str,
    stream: &str,
    revision: u32,
    sequence: u32,
    count: usize,
) -> CommitAttempt {
    let events = (0..count)
        .map(|i| EventMessage::new(json!({ "stream": stream, "index": i })))
        .collect();
    CommitAttempt::new(bucket, stream, revision, Uuid::new_v4(), sequence, events)
}

// =============================================================================
// Append protocol
// =============================================================================

pub async fn test_commit_assigns_increasing_checkpoints(persistence: &Persistence) {
    let bucket = unique_bucket("increasing");
    let mut last = Checkpoint::ZERO;

    for sequence in 1..=5u32 {
        let commit = persistence
            .commit(make_attempt(&bucket, "s1", sequence * 2, sequence, 2))
            .await
            .expect("commit should succeed");
        assert!(commit.checkpoint > last, "checkpoints must increase");
        assert_eq!(commit.revision_from(), sequence * 2 - 1);
        last = commit.checkpoint;
    }
}

pub async fn test_duplicate_commit_is_detected(persistence: &Persistence) {
    let bucket = unique_bucket("duplicate");
    let attempt = make_attempt(&bucket, "s1", 3, 1, 3);

    let first = persistence
        .commit(attempt.clone())
        .await
        .expect("first commit should succeed");

    let err = persistence
        .commit(attempt)
        .await
        .expect_err("retry should be rejected");
    assert!(err.is_duplicate(), "expected Duplicate, got {:?}", err);

    let stored = persistence
        .get_from(&bucket, "s1", 0, u32::MAX)
        .await
        .expect("read should succeed");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].checkpoint, first.checkpoint);
}

pub async fn test_conflicting_commit_is_rejected(persistence: &Persistence) {
    let bucket = unique_bucket("conflict");

    persistence
        .commit(make_attempt(&bucket, "s1", 3, 1, 3))
        .await
        .expect("first commit should succeed");

    let err = persistence
        .commit(make_attempt(&bucket, "s1", 3, 1, 3))
        .await
        .expect_err("rival should be rejected");
    assert!(err.is_conflict(), "expected Conflict, got {:?}", err);

    let stored = persistence
        .get_from(&bucket, "s1", 0, u32::MAX)
        .await
        .expect("read should succeed");
    assert_eq!(stored.len(), 1);
}

pub async fn test_concurrent_appends_get_distinct_checkpoints(persistence: &Arc<Persistence>) {
    let bucket = unique_bucket("concurrent");

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let persistence = Arc::clone(persistence);
            let attempt = make_attempt(&bucket, &format!("s{}", i), 1, 1, 1);
            tokio::spawn(async move { persistence.commit(attempt).await })
        })
        .collect();

    let mut checkpoints = HashSet::new();
    for handle in handles {
        let commit = handle
            .await
            .expect("task should not panic")
            .expect("commit should succeed");
        assert!(checkpoints.insert(commit.checkpoint));
    }
    assert_eq!(checkpoints.len(), 10);
}

// =============================================================================
// Queries
// =============================================================================

pub async fn test_revision_query_is_ordered(persistence: &Persistence) {
    let bucket = unique_bucket("revisions");
    persistence.commit(make_attempt(&bucket, "s1", 2, 1, 2)).await.unwrap();
    persistence.commit(make_attempt(&bucket, "s1", 4, 2, 2)).await.unwrap();
    persistence.commit(make_attempt(&bucket, "s1", 7, 3, 3)).await.unwrap();

    let window = persistence.get_from(&bucket, "s1", 3, 5).await.unwrap();
    let revisions: Vec<u32> = window.iter().map(|c| c.stream_revision).collect();
    assert_eq!(revisions, vec![4, 7]);

    assert_eq!(window[1].events.len(), 3);
    assert_eq!(window[1].events[2].body, json!({ "stream": "s1", "index": 2 }));
}

pub async fn test_checkpoint_cursor_is_exclusive(persistence: &Persistence) {
    let bucket = unique_bucket("cursor");
    let mut issued = Vec::new();
    for i in 1..=4u32 {
        let commit = persistence
            .commit(make_attempt(&bucket, &format!("s{}", i), 1, 1, 1))
            .await
            .unwrap();
        issued.push(commit.checkpoint);
    }

    let after_second = persistence
        .get_from_checkpoint(&bucket, issued[1])
        .await
        .unwrap();
    let seen: Vec<Checkpoint> = after_second.iter().map(|c| c.checkpoint).collect();
    assert_eq!(seen, issued[2..].to_vec());

    let window = persistence
        .get_from_to_checkpoint(Some(bucket.as_str()), issued[0], issued[2])
        .await
        .unwrap();
    let seen: Vec<Checkpoint> = window.iter().map(|c| c.checkpoint).collect();
    assert_eq!(seen, issued[1..3].to_vec());

    let global = persistence
        .get_from_checkpoint_all(issued[2])
        .await
        .unwrap();
    assert!(global.iter().all(|c| c.checkpoint > issued[2]));
    assert!(global.iter().any(|c| c.checkpoint == issued[3]));
}

pub async fn test_time_window(persistence: &Persistence) {
    let bucket = unique_bucket("time");
    // Whole seconds survive millisecond-precision stores unchanged.
    let base = Utc::now() - Duration::hours(1);
    let base = base - Duration::nanoseconds(base.timestamp_subsec_nanos() as i64);

    for i in 0..3u32 {
        let attempt = make_attempt(&bucket, "s1", i + 1, i + 1, 1)
            .with_commit_stamp(base + Duration::minutes(i as i64 * 10));
        persistence.commit(attempt).await.unwrap();
    }

    let from_middle = persistence
        .get_from_time(&bucket, base + Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(from_middle.len(), 2);

    let window = persistence
        .get_from_to_time(&bucket, base, base + Duration::minutes(20))
        .await
        .unwrap();
    let revisions: Vec<u32> = window.iter().map(|c| c.stream_revision).collect();
    assert_eq!(revisions, vec![1, 2]);
    assert_eq!(window[0].commit_stamp, base);
}

// =============================================================================
// Snapshots
// =============================================================================

pub async fn test_snapshot_reconciles_stream_head(persistence: &Persistence) {
    let bucket = unique_bucket("snapshot");
    persistence.commit(make_attempt(&bucket, "s1", 5, 1, 5)).await.unwrap();
    persistence.commit(make_attempt(&bucket, "s2", 1, 1, 1)).await.unwrap();
    persistence.settle_stream_heads().await;

    let worklist = persistence.get_streams_to_snapshot(&bucket, 1).await.unwrap();
    let streams: Vec<&str> = worklist.iter().map(|h| h.stream_id.as_str()).collect();
    assert_eq!(streams, vec!["s1", "s2"]);

    let stored = persistence
        .add_snapshot(&Snapshot::new(&bucket, "s1", 4, json!({ "count": 4 })))
        .await
        .unwrap();
    assert!(stored);

    let worklist = persistence.get_streams_to_snapshot(&bucket, 1).await.unwrap();
    let s1 = worklist
        .iter()
        .find(|h| h.stream_id == "s1")
        .expect("s1 still has one unsnapshotted event");
    assert_eq!(s1.unsnapshotted, 1);
    assert_eq!(s1.snapshot_revision, 4);
    assert_eq!(s1.head_revision, 5);

    let snapshot = persistence
        .get_snapshot(&bucket, "s1", u32::MAX)
        .await
        .unwrap()
        .expect("snapshot should exist");
    assert_eq!(snapshot.stream_revision, 4);
    assert_eq!(snapshot.payload, json!({ "count": 4 }));
    assert!(persistence.get_snapshot(&bucket, "s1", 3).await.unwrap().is_none());
}

// =============================================================================
// Recycle lifecycle
// =============================================================================

pub async fn test_delete_stream_and_reclaim(persistence: &Persistence) {
    let bucket = unique_bucket("recycle");
    let doomed = persistence.commit(make_attempt(&bucket, "doomed", 1, 1, 1)).await.unwrap();
    persistence.commit(make_attempt(&bucket, "kept", 1, 1, 1)).await.unwrap();

    persistence.delete_stream(&bucket, "doomed").await.unwrap();

    assert!(persistence.get_from(&bucket, "doomed", 0, u32::MAX).await.unwrap().is_empty());
    let live = persistence.get_from_checkpoint(&bucket, Checkpoint::ZERO).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].stream_id, "kept");

    let global = persistence.get_from_checkpoint_all(Checkpoint::ZERO).await.unwrap();
    assert!(global.iter().all(|c| c.checkpoint != doomed.checkpoint));

    let deleted = persistence.get_deleted_commits().await.unwrap();
    let recycled = deleted
        .iter()
        .find(|c| c.checkpoint == doomed.checkpoint)
        .expect("deleted commit should be in the recycle bin");
    assert!(recycled.is_recycled());
    assert_eq!(recycled.origin_bucket_id, bucket);

    // "kept" holds a later checkpoint, so the deleted commit is below the bound.
    persistence.reclaim().await.unwrap();
    let deleted = persistence.get_deleted_commits().await.unwrap();
    assert!(deleted.iter().all(|c| c.checkpoint != doomed.checkpoint));

    let reborn = persistence
        .commit(make_attempt(&bucket, "doomed", 1, 1, 1))
        .await
        .expect("deleted stream can be recreated");
    assert!(reborn.checkpoint > doomed.checkpoint);
}

pub async fn test_purge_bucket(persistence: &Persistence) {
    let purged = unique_bucket("purged");
    let survivor = unique_bucket("survivor");
    persistence.commit(make_attempt(&purged, "s1", 1, 1, 1)).await.unwrap();
    persistence.commit(make_attempt(&survivor, "s1", 1, 1, 1)).await.unwrap();
    persistence.settle_stream_heads().await;

    persistence.purge(Some(purged.as_str())).await.unwrap();

    assert!(persistence.get_from_checkpoint(&purged, Checkpoint::ZERO).await.unwrap().is_empty());
    assert!(persistence.get_streams_to_snapshot(&purged, 0).await.unwrap().is_empty());
    assert_eq!(
        persistence.get_from_checkpoint(&survivor, Checkpoint::ZERO).await.unwrap().len(),
        1
    );

    persistence
        .commit(make_attempt(&purged, "s1", 1, 1, 1))
        .await
        .expect("purged bucket accepts new commits");
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all persistence contract tests against an engine.
#[macro_export]
macro_rules! run_persistence_tests {
    ($persistence:expr) => {
        use $crate::storage::persistence_tests::*;

        // append protocol
        test_commit_assigns_increasing_checkpoints($persistence).await;
        println!("  test_commit_assigns_increasing_checkpoints: PASSED");

        test_duplicate_commit_is_detected($persistence).await;
        println!("  test_duplicate_commit_is_detected: PASSED");

        test_conflicting_commit_is_rejected($persistence).await;
        println!("  test_conflicting_commit_is_rejected: PASSED");

        test_concurrent_appends_get_distinct_checkpoints($persistence).await;
        println!("  test_concurrent_appends_get_distinct_checkpoints: PASSED");

        // queries
        test_revision_query_is_ordered($persistence).await;
        println!("  test_revision_query_is_ordered: PASSED");

        test_checkpoint_cursor_is_exclusive($persistence).await;
        println!("  test_checkpoint_cursor_is_exclusive: PASSED");

        test_time_window($persistence).await;
        println!("  test_time_window: PASSED");

        // snapshots
        test_snapshot_reconciles_stream_head($persistence).await;
        println!("  test_snapshot_reconciles_stream_head: PASSED");

        // recycle lifecycle
        test_delete_stream_and_reclaim($persistence).await;
        println!("  test_delete_stream_and_reclaim: PASSED");

        test_purge_bucket($persistence).await;
        println!("  test_purge_bucket: PASSED");
    };
}
