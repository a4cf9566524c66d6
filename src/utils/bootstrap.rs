//! Bootstrap utilities for chronicle binaries and embedding services.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LOG_ENV_VAR};
use crate::persistence::{Persistence, PersistenceError};
use crate::serialization::JsonSerializer;
use crate::storage::init_storage;

use super::retry::{is_retryable, store_backoff};

/// Initialize tracing with CHRONICLE_LOG environment variable.
///
/// Defaults to "info" level if CHRONICLE_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build and initialize a persistence engine from configuration.
///
/// Initialization is the first round trip to the store, so it is retried
/// with backoff while the store reports itself unavailable. Any other
/// failure is returned immediately.
pub async fn connect_persistence(
    config: &Config,
) -> Result<Arc<Persistence>, Box<dyn std::error::Error>> {
    let stores = init_storage(&config.storage).await?;
    let persistence = Arc::new(Persistence::new(
        stores,
        Arc::new(JsonSerializer),
        config.persistence.clone(),
    ));

    (|| async { persistence.initialize().await })
        .retry(store_backoff())
        .when(is_retryable)
        .notify(|err: &PersistenceError, dur: Duration| {
            warn!(error = %err, delay = ?dur, "Store unavailable, retrying");
        })
        .await?;

    info!(storage_type = ?config.storage.storage_type, "Persistence ready");
    Ok(persistence)
}
