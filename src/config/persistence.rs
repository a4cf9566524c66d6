//! Engine and maintenance configuration.

use serde::Deserialize;

/// Default interval between recycle bin reclamation passes.
pub const DEFAULT_RECYCLE_INTERVAL_SECS: u64 = 300;

/// Persistence engine options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Skip stream head maintenance entirely.
    ///
    /// No head updates are dispatched after appends and
    /// `get_streams_to_snapshot` returns nothing. Snapshots themselves stay
    /// readable and writable.
    pub disable_snapshot_support: bool,
}

/// Periodic reclamation of the recycle bin.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecyclerConfig {
    /// Seconds between passes.
    pub interval_secs: u64,
}

impl Default for RecyclerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_RECYCLE_INTERVAL_SECS,
        }
    }
}

impl RecyclerConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs.max(1))
    }
}
