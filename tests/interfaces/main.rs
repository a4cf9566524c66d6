//! Interface tests for the persistence engine using Cucumber.
//!
//! These scenarios describe the engine's contract independently of the
//! storage backend. Select a backend via environment variable:
//!
//! ```bash
//! # In-memory (default)
//! cargo test --test interfaces
//!
//! # MongoDB (needs a running server, MONGODB_URI)
//! STORAGE_BACKEND=mongodb cargo test --test interfaces --features mongodb
//! ```
//!
//! Scenarios run one at a time: a shared backend is dropped at the start of each.

mod backend;

use cucumber::World;
use steps::PersistenceWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Append Protocol Interface Tests ===\n");
    PersistenceWorld::cucumber()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .run("tests/interfaces/features/append.feature")
        .await;

    println!("\n=== Running Snapshot Interface Tests ===\n");
    PersistenceWorld::cucumber()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .run("tests/interfaces/features/snapshots.feature")
        .await;

    println!("\n=== Running Recycle Lifecycle Interface Tests ===\n");
    PersistenceWorld::cucumber()
        .max_concurrent_scenarios(1)
        .fail_on_skipped()
        .run("tests/interfaces/features/recycle.feature")
        .await;
}
