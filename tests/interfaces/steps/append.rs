//! Append protocol step definitions.

use chronicle::{Checkpoint, CommitAttempt, EventMessage, PersistenceError};
use cucumber::{given, then, when};
use serde_json::json;
use uuid::Uuid;

use super::{parse_list, PersistenceWorld};

// --- Given steps ---

#[given(expr = "stream {string} in bucket {string} has {int} commit(s) of {int} event(s)")]
async fn given_stream_with_commits(
    world: &mut PersistenceWorld,
    stream: String,
    bucket: String,
    commits: u32,
    events: u32,
) {
    for n in 0..commits {
        let from = n * events + 1;
        let to = from + events - 1;
        let attempt = world.attempt(&bucket, &stream, Uuid::new_v4(), from, to);
        world.append(&format!("{stream}-{n}"), attempt).await;
        assert!(
            world.last_append().is_ok(),
            "setup commit failed: {:?}",
            world.last_append()
        );
    }
    world.engine().settle_stream_heads().await;
}

// --- When steps ---

#[when(expr = "I commit {string} to stream {string} in bucket {string} with revisions {int} to {int}")]
async fn when_commit(
    world: &mut PersistenceWorld,
    name: String,
    stream: String,
    bucket: String,
    from: u32,
    to: u32,
) {
    let attempt = world.attempt(
        &bucket,
        &stream,
        PersistenceWorld::commit_id(&name),
        from,
        to,
    );
    world.append(&name, attempt).await;
}

#[when(expr = "I retry commit {string}")]
async fn when_retry_commit(world: &mut PersistenceWorld, name: String) {
    let attempt = world
        .attempts
        .get(&name)
        .cloned()
        .expect("commit was never attempted");
    world.append(&name, attempt).await;
}

#[when(expr = "{int} engines each commit {int} times to their own stream in bucket {string}")]
async fn when_engines_commit_concurrently(
    world: &mut PersistenceWorld,
    engines: usize,
    commits: u32,
    bucket: String,
) {
    let mut handles = Vec::with_capacity(engines);
    for index in 0..engines {
        let engine = world.add_engine();
        engine.initialize().await.expect("Failed to initialize");
        // Every engine caches the same candidate, so the first round collides.
        engine
            .checkpoints()
            .peek_next(true)
            .await
            .expect("Failed to warm allocator");

        let bucket = bucket.clone();
        handles.push(tokio::spawn(async move {
            let stream = format!("worker-{index}");
            for sequence in 1..=commits {
                let attempt = CommitAttempt::new(
                    &bucket,
                    &stream,
                    sequence,
                    Uuid::new_v4(),
                    sequence,
                    vec![EventMessage::new(json!({ "worker": index }))],
                );
                engine.commit(attempt).await?;
            }
            Ok::<_, PersistenceError>(())
        }));
    }

    for handle in handles {
        handle
            .await
            .expect("worker panicked")
            .expect("concurrent commit failed");
    }
}

#[when(expr = "I read bucket {string} after checkpoint {int}")]
async fn when_read_after_checkpoint(world: &mut PersistenceWorld, bucket: String, cursor: i64) {
    world.last_read = world
        .engine()
        .get_from_checkpoint(&bucket, Checkpoint::new(cursor))
        .await
        .expect("Failed to read commits");
}

#[when(expr = "I read stream {string} in bucket {string} from revision {int} to {int}")]
async fn when_read_revisions(
    world: &mut PersistenceWorld,
    stream: String,
    bucket: String,
    min_revision: u32,
    max_revision: u32,
) {
    world.last_read = world
        .engine()
        .get_from(&bucket, &stream, min_revision, max_revision)
        .await
        .expect("Failed to read commits");
}

// --- Then steps ---

#[then(expr = "the commit succeeds at checkpoint {int}")]
async fn then_commit_succeeds_at(world: &mut PersistenceWorld, checkpoint: i64) {
    match world.last_append() {
        Ok(commit) => assert_eq!(commit.checkpoint, Checkpoint::new(checkpoint)),
        Err(e) => panic!("Expected success, got {e}"),
    }
}

#[then("the commit succeeds")]
async fn then_commit_succeeds(world: &mut PersistenceWorld) {
    if let Err(e) = world.last_append() {
        panic!("Expected success, got {e}");
    }
}

#[then("the commit is rejected as a duplicate")]
async fn then_commit_duplicate(world: &mut PersistenceWorld) {
    match world.last_append() {
        Err(e) => assert!(e.is_duplicate(), "Expected Duplicate, got {e}"),
        Ok(commit) => panic!("Expected Duplicate, got checkpoint {}", commit.checkpoint),
    }
}

#[then("the commit is rejected as a conflict")]
async fn then_commit_conflict(world: &mut PersistenceWorld) {
    match world.last_append() {
        Err(e) => assert!(e.is_conflict(), "Expected Conflict, got {e}"),
        Ok(commit) => panic!("Expected Conflict, got checkpoint {}", commit.checkpoint),
    }
}

#[then(expr = "bucket {string} holds exactly {int} commit(s)")]
async fn then_bucket_holds(world: &mut PersistenceWorld, bucket: String, count: usize) {
    let commits = world
        .engine()
        .get_from_checkpoint(&bucket, Checkpoint::ZERO)
        .await
        .expect("Failed to read commits");
    assert_eq!(commits.len(), count);
}

#[then(expr = "the only commit of stream {string} in bucket {string} is {string} at checkpoint {int}")]
async fn then_only_commit(
    world: &mut PersistenceWorld,
    stream: String,
    bucket: String,
    name: String,
    checkpoint: i64,
) {
    let commits = world
        .engine()
        .get_from(&bucket, &stream, 0, u32::MAX)
        .await
        .expect("Failed to read commits");
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].commit_id, PersistenceWorld::commit_id(&name));
    assert_eq!(commits[0].checkpoint, Checkpoint::new(checkpoint));
}

#[then(expr = "all commits hold checkpoints 1 to {int} without gaps")]
async fn then_checkpoints_contiguous(world: &mut PersistenceWorld, last: i64) {
    let commits = world
        .engine()
        .get_from_checkpoint_all(Checkpoint::ZERO)
        .await
        .expect("Failed to read commits");
    let checkpoints: Vec<i64> = commits.iter().map(|c| c.checkpoint.value()).collect();
    let expected: Vec<i64> = (1..=last).collect();
    assert_eq!(checkpoints, expected);
}

#[then(expr = "the commits read have checkpoints {string}")]
async fn then_read_checkpoints(world: &mut PersistenceWorld, expected: String) {
    let checkpoints: Vec<i64> = world
        .last_read
        .iter()
        .map(|c| c.checkpoint.value())
        .collect();
    assert_eq!(checkpoints, parse_list(&expected));
}

#[then(expr = "the commits read end at revisions {string}")]
async fn then_read_revisions(world: &mut PersistenceWorld, expected: String) {
    let revisions: Vec<i64> = world
        .last_read
        .iter()
        .map(|c| i64::from(c.stream_revision))
        .collect();
    assert_eq!(revisions, parse_list(&expected));
}
