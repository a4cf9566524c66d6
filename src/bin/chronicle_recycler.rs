//! chronicle-recycler: recycle bin reclamation daemon
//!
//! Periodically erases soft-deleted commits that are provably safe to erase:
//! only recycled commits below the last checkpoint issued at the start of a
//! pass are touched, so concurrent writers are never affected.
//!
//! ## Configuration
//! - CHRONICLE_CONFIG: Path to a YAML config file
//! - CHRONICLE__STORAGE__TYPE: memory or mongodb
//! - CHRONICLE__STORAGE__MONGODB__URI / CHRONICLE__STORAGE__MONGODB__DATABASE
//! - CHRONICLE__RECYCLER__INTERVAL_SECS: Seconds between passes (default 300)
//! - CHRONICLE_LOG: Log filter (default "info")

use chronicle::config::Config;
use chronicle::utils::bootstrap::{connect_persistence, init_tracing};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let persistence = connect_persistence(&config).await?;

    let handle = persistence.spawn_recycler(config.recycler.interval());
    info!(
        interval_secs = config.recycler.interval_secs,
        "Recycler running, press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;

    handle.stop();
    persistence.dispose();
    info!("Recycler shut down");
    Ok(())
}
