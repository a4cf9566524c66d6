//! Stream head maintenance after appends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, error, Instrument};

use crate::storage::StreamHeadStore;

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Dispatches stream head updates as detached tasks.
///
/// The append that triggers an update never waits for it and never sees its
/// error; failures are logged and dropped. Readers of stream heads therefore
/// observe a window in which a committed append is not yet reflected. Drift
/// from failed updates is corrected when the next snapshot is written.
pub(crate) struct StreamHeadMaintainer {
    heads: Arc<dyn StreamHeadStore>,
    enabled: bool,
    in_flight: Arc<InFlight>,
}

impl StreamHeadMaintainer {
    pub fn new(heads: Arc<dyn StreamHeadStore>, enabled: bool) -> Self {
        Self {
            heads,
            enabled,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Spawn the head update for a committed batch.
    pub fn dispatch(
        &self,
        bucket_id: String,
        stream_id: String,
        head_revision: u32,
        event_count: u32,
    ) {
        if !self.enabled {
            return;
        }

        let heads = Arc::clone(&self.heads);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.count.fetch_add(1, Ordering::AcqRel);

        let span = tracing::debug_span!("stream_head_update", %bucket_id, %stream_id);
        tokio::spawn(
            async move {
                match heads
                    .increment(&bucket_id, &stream_id, head_revision, event_count)
                    .await
                {
                    Ok(()) => debug!(head_revision, event_count, "Stream head updated"),
                    Err(e) => error!(error = %e, head_revision, "Stream head update failed"),
                }
                if in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
                    in_flight.idle.notify_waiters();
                }
            }
            .instrument(span),
        );
    }

    /// Wait until every dispatched update has finished.
    pub async fn settle(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight.count.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}
