use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::queue::{saturating_millis, QueueRegistry};

/// Background task that sweeps expired transient messages out of every
/// channel queue.
///
/// Add and retrieve purge on their own; the sweep only bounds how long an
/// idle channel keeps dead messages in memory.
pub struct PurgeTask {
    interval: Duration,
    registry: Arc<QueueRegistry>,
    shutdown: broadcast::Receiver<()>,
}

impl PurgeTask {
    pub fn new(
        interval: Duration,
        registry: Arc<QueueRegistry>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interval,
            registry,
            shutdown,
        }
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self) {
        let mut purge_timer = tokio::time::interval(self.interval);
        purge_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Skip immediate first tick
        purge_timer.tick().await;

        tracing::info!(
            purge_interval_ms = saturating_millis(self.interval),
            "Purge task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Purge task received shutdown signal");
                    break;
                }
                _ = purge_timer.tick() => {
                    let removed = self.registry.purge_all();
                    tracing::trace!(removed = removed, "Purge sweep finished");
                }
            }
        }

        tracing::info!("Purge task stopped");
    }
}
