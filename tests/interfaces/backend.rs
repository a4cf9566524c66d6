//! Backend factory for interface tests.
//!
//! Provides a unified way to create storage backends based on environment configuration.

use std::env;

use chronicle::Stores;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Mongodb,
}

impl StorageBackend {
    pub fn from_env() -> Self {
        match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongodb" => StorageBackend::Mongodb,
            _ => StorageBackend::Memory,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Mongodb => "mongodb",
        }
    }

    /// Fresh stores. Shared backends must be dropped by the caller before use.
    pub async fn stores(&self) -> Stores {
        match self {
            StorageBackend::Memory => Stores::memory(),
            StorageBackend::Mongodb => create_mongodb().await,
        }
    }
}

#[cfg(feature = "mongodb")]
async fn create_mongodb() -> Stores {
    use std::sync::Arc;

    use chronicle::storage::{MongoCommitStore, MongoSnapshotStore, MongoStreamHeadStore};

    let uri =
        env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(&uri)
        .await
        .expect("Failed to connect to MongoDB");
    let database = client.database("chronicle_interfaces");

    Stores {
        commits: Arc::new(MongoCommitStore::new(&database)),
        stream_heads: Arc::new(MongoStreamHeadStore::new(&database)),
        snapshots: Arc::new(MongoSnapshotStore::new(&database)),
    }
}

#[cfg(not(feature = "mongodb"))]
async fn create_mongodb() -> Stores {
    panic!("MongoDB feature not enabled. Build with --features mongodb");
}
