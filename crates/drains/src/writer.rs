//! Drain writer - one state machine per drain URL
//!
//! ```text
//! IDLE --first envelope--> CONNECTING --ok--> OPEN
//!                              |  ^            |
//!                           fail  +--delay--+  | write error
//!                              v            |  v
//!                            BACKOFF <---------+
//!
//! any state --cancel--> SHUTTING-DOWN (terminal)
//! ```
//!
//! The writer owns its inbound queue's consumer side and its connection;
//! nothing else touches either. It never blocks the router: enqueues go
//! through a drop-oldest diode whose drops are counted per drain. An
//! envelope taken from the queue but not yet written survives reconnects
//! (the in-flight slot) so delivery order holds across backoff.

use std::sync::Arc;
use std::time::Duration;

use carrier_diode::OneToOneReceiver;
use carrier_metrics::DrainScopedMetrics;
use carrier_protocol::Envelope;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::binding::DrainSpec;
use crate::syslog::format_message;
use crate::transport::{DrainConnection, TransportFactory};

/// Why a writer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterExit {
    /// No write activity for the idle timeout
    IdleTimeout,
    /// Cooperative shutdown
    Shutdown,
}

enum State {
    Idle,
    Connecting,
    Open(DrainConnection),
    Backoff,
}

pub(crate) struct DrainWriter {
    spec: Arc<DrainSpec>,
    queue: OneToOneReceiver<Envelope>,
    wakeup: Arc<Notify>,
    transports: Arc<TransportFactory>,
    backoff: Backoff,
    idle_timeout: Duration,
    metrics: Arc<DrainScopedMetrics>,
    inflight: Option<Envelope>,
}

impl DrainWriter {
    pub(crate) fn new(
        spec: Arc<DrainSpec>,
        queue: OneToOneReceiver<Envelope>,
        wakeup: Arc<Notify>,
        transports: Arc<TransportFactory>,
        backoff: Backoff,
        idle_timeout: Duration,
        metrics: Arc<DrainScopedMetrics>,
    ) -> Self {
        Self {
            spec,
            queue,
            wakeup,
            transports,
            backoff,
            idle_timeout,
            metrics,
            inflight: None,
        }
    }

    pub(crate) async fn run(mut self, shutdown: CancellationToken) -> WriterExit {
        let url = self.spec.raw_url.clone();
        tracing::debug!(drain = %url, "drain writer starting idle");

        let mut state = State::Idle;
        let mut last_activity = Instant::now();

        loop {
            state = match state {
                State::Idle => {
                    tokio::select! {
                        _ = self.wakeup.notified() => State::Connecting,
                        _ = shutdown.cancelled() => return self.shut_down(None).await,
                    }
                }

                State::Connecting => match self.transports.connect(&self.spec).await {
                    Ok(connection) => {
                        tracing::debug!(drain = %url, "drain connected");
                        last_activity = Instant::now();
                        State::Open(connection)
                    }
                    Err(e) => {
                        self.metrics.record_connect_failure();
                        tracing::warn!(
                            drain = %url,
                            error = %e,
                            failures = self.backoff.failures() + 1,
                            "drain connect failed"
                        );
                        State::Backoff
                    }
                },

                State::Open(mut connection) => loop {
                    if self.inflight.is_none() {
                        self.inflight = self.queue.try_next();
                    }

                    let Some(envelope) = self.inflight.as_ref() else {
                        let idle_deadline = last_activity + self.idle_timeout;
                        if Instant::now() >= idle_deadline {
                            tracing::info!(drain = %url, "drain idle, evicting writer");
                            return WriterExit::IdleTimeout;
                        }
                        tokio::select! {
                            _ = self.wakeup.notified() => continue,
                            _ = tokio::time::sleep_until(idle_deadline) => continue,
                            _ = shutdown.cancelled() => {
                                return self.shut_down(Some(connection)).await;
                            }
                        }
                    };

                    let message = match format_message(&self.spec, envelope) {
                        Ok(message) => message,
                        Err(e) => {
                            self.metrics.record_format_error();
                            tracing::debug!(drain = %url, error = %e, "dropping unformattable envelope");
                            self.inflight = None;
                            continue;
                        }
                    };

                    match self.transports.send(&self.spec, &mut connection, &message).await {
                        Ok(()) => {
                            self.metrics.record_written();
                            self.backoff.reset();
                            last_activity = Instant::now();
                            self.inflight = None;
                        }
                        Err(e) => {
                            self.metrics.record_connect_failure();
                            tracing::warn!(drain = %url, error = %e, "drain write failed");
                            // Connection closes by drop; the in-flight
                            // envelope is retried after reconnect.
                            break State::Backoff;
                        }
                    }
                },

                State::Backoff => {
                    let delay = self.backoff.next_delay();
                    tracing::debug!(
                        drain = %url,
                        delay_ms = delay.as_millis() as u64,
                        failures = self.backoff.failures(),
                        "drain backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => State::Connecting,
                        _ = shutdown.cancelled() => return self.shut_down(None).await,
                    }
                }
            };
        }
    }

    /// SHUTTING-DOWN: finish the queue over an open connection, or
    /// discard it (counted) when there is none.
    async fn shut_down(&mut self, connection: Option<DrainConnection>) -> WriterExit {
        let url = self.spec.raw_url.clone();

        match connection {
            Some(mut connection) => {
                while let Some(envelope) = self.inflight.take().or_else(|| self.queue.try_next()) {
                    let Ok(message) = format_message(&self.spec, &envelope) else {
                        self.metrics.record_format_error();
                        continue;
                    };
                    if self
                        .transports
                        .send(&self.spec, &mut connection, &message)
                        .await
                        .is_err()
                    {
                        self.discard_remaining(1);
                        break;
                    }
                    self.metrics.record_written();
                }
            }
            None => self.discard_remaining(0),
        }

        tracing::debug!(drain = %url, "drain writer shut down");
        WriterExit::Shutdown
    }

    /// Count everything still queued (plus `extra` already dequeued) as
    /// dropped.
    fn discard_remaining(&mut self, extra: u64) {
        let mut discarded = extra;
        if self.inflight.take().is_some() {
            discarded += 1;
        }
        while self.queue.try_next().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            self.metrics.record_queue_dropped(discarded);
        }
    }
}
