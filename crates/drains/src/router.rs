//! Drain router - one pass per envelope
//!
//! Consumes the tap and fans each log envelope out to the writers of
//! its tenant's APP-scope drains plus every AGGREGATE-scope drain.
//! Non-log envelopes have no syslog rendering and are skipped here,
//! before any queue is touched.
//!
//! The router reads the published binding set as an `Arc` snapshot per
//! envelope: a concurrent publication swaps the pointer, never the set
//! in place, so routing decisions are always internally consistent.

use std::sync::Arc;
use std::time::Duration;

use carrier_diode::Subscriber;
use carrier_protocol::Envelope;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::binding::BindingSet;
use crate::manager::WriterPool;

/// Tap consumer that routes envelopes into writer queues.
pub struct DrainRouter {
    tap: Subscriber<Envelope>,
    published: Arc<RwLock<Arc<BindingSet>>>,
    pool: Arc<WriterPool>,
}

impl DrainRouter {
    pub(crate) fn new(
        tap: Subscriber<Envelope>,
        published: Arc<RwLock<Arc<BindingSet>>>,
        pool: Arc<WriterPool>,
    ) -> Self {
        Self {
            tap,
            published,
            pool,
        }
    }

    /// Run until cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let idle_sleep = Duration::from_millis(1);

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.tap.try_next() {
                Some(envelope) => self.route(&envelope, &shutdown),
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(idle_sleep) => {}
                        _ = shutdown.cancelled() => {}
                    }
                }
            }
        }

        tracing::debug!("drain router shut down");
    }

    fn route(&self, envelope: &Envelope, shutdown: &CancellationToken) {
        if envelope.as_log().is_none() {
            return;
        }

        let set = Arc::clone(&*self.published.read());

        for spec in set.app_drains(&envelope.source_id) {
            self.pool.enqueue(spec, envelope, shutdown);
        }
        for spec in set.aggregate_drains() {
            self.pool.enqueue(spec, envelope, shutdown);
        }
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;
