//! Periodic metrics reporter
//!
//! Logs a structured snapshot of every counter on a fixed interval, and a
//! final snapshot at shutdown. This is the agent's loss-visibility
//! surface: ingress, egress, and per-drain drops all appear here.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::MetricsRegistry;

/// Default reporting interval
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic reporter task over a [`MetricsRegistry`].
pub struct MetricsReporter {
    registry: Arc<MetricsRegistry>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(registry: Arc<MetricsRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run until cancelled, logging one snapshot per interval and a final
    /// one on the way out.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the first
        // report carries a full interval of data.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => self.report(),
                _ = shutdown.cancelled() => {
                    self.report();
                    return;
                }
            }
        }
    }

    fn report(&self) {
        let ingress = self.registry.ingress().snapshot();
        let egress = self.registry.egress().snapshot();
        let drains = self.registry.drains().snapshot();

        tracing::info!(
            ingress_received = ingress.envelopes_received,
            ingress_malformed = ingress.malformed_dropped,
            ingress_overflow_dropped = ingress.overflow_dropped,
            egress_written = egress.envelopes_written,
            egress_dropped = egress.dropped,
            binding_fetches = drains.binding_fetches,
            fetch_failures = drains.fetch_failures,
            drains_rejected = drains.drains_rejected,
            active_writers = drains.active_writers,
            idle_evictions = drains.idle_evictions,
            "metrics snapshot"
        );

        for (url, drain) in self.registry.per_drain_snapshots() {
            tracing::info!(
                drain = %url,
                enqueued = drain.enqueued,
                written = drain.written,
                queue_dropped = drain.queue_dropped,
                connect_failures = drain.connect_failures,
                format_errors = drain.format_errors,
                "drain metrics snapshot"
            );
        }
    }
}
