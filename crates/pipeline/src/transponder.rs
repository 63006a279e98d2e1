//! Transponder - the diode's single consumer and batch driver
//!
//! Polls the ingress diode, enriches each envelope (tagger, aggregator),
//! offers a copy to the drain tap, and accumulates envelopes into
//! batches. A batch flushes when it reaches the configured size or when
//! the batch interval has elapsed since its first envelope. On an empty
//! diode the loop parks briefly; the wakeup cadence never exceeds the
//! batch interval.

use std::sync::Arc;
use std::time::Duration;

use carrier_diode::{ManyToOneReceiver, Publisher};
use carrier_metrics::EgressMetrics;
use carrier_protocol::Envelope;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::processor::{BatchWriter, EnvelopeProcessor};

/// Transponder tuning
#[derive(Debug, Clone)]
pub struct TransponderConfig {
    /// Flush when the batch reaches this many envelopes
    pub batch_size: usize,

    /// Flush when this much time has passed since the batch's first
    /// envelope
    pub batch_interval: Duration,
}

impl Default for TransponderConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_interval: Duration::from_millis(100),
        }
    }
}

/// The batcher / egress driver.
pub struct Transponder<W> {
    diode: ManyToOneReceiver<Envelope>,
    writer: W,
    processors: Vec<Arc<dyn EnvelopeProcessor>>,
    tap: Publisher<Envelope>,
    config: TransponderConfig,
    metrics: Arc<EgressMetrics>,
}

impl<W: BatchWriter> Transponder<W> {
    pub fn new(
        diode: ManyToOneReceiver<Envelope>,
        writer: W,
        processors: Vec<Arc<dyn EnvelopeProcessor>>,
        tap: Publisher<Envelope>,
        config: TransponderConfig,
        metrics: Arc<EgressMetrics>,
    ) -> Self {
        Self {
            diode,
            writer,
            processors,
            tap,
            config,
            metrics,
        }
    }

    /// Run until cancelled. The final partial batch is flushed on the
    /// way out.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            batch_interval_ms = self.config.batch_interval.as_millis() as u64,
            "transponder starting"
        );

        let idle_sleep = (self.config.batch_interval / 10)
            .clamp(Duration::from_millis(1), Duration::from_millis(10));
        let mut batch: Vec<Envelope> = Vec::with_capacity(self.config.batch_size);
        let mut deadline: Option<Instant> = None;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Some(d) = deadline {
                if Instant::now() >= d {
                    self.flush(&mut batch).await;
                    deadline = None;
                }
            }

            match self.diode.try_next() {
                Some(mut envelope) => {
                    for processor in &self.processors {
                        processor.process(&mut envelope);
                    }
                    self.tap.set(envelope.clone());

                    if batch.is_empty() {
                        deadline = Some(Instant::now() + self.config.batch_interval);
                    }
                    batch.push(envelope);

                    if batch.len() >= self.config.batch_size {
                        self.flush(&mut batch).await;
                        deadline = None;
                    }
                }
                None => {
                    // Park until the next flush deadline or the idle
                    // nap, whichever is sooner; cancellation cuts both
                    // short.
                    let nap = match deadline {
                        Some(d) => d
                            .saturating_duration_since(Instant::now())
                            .min(idle_sleep),
                        None => idle_sleep,
                    };
                    tokio::select! {
                        _ = tokio::time::sleep(nap) => {}
                        _ = shutdown.cancelled() => {}
                    }
                }
            }
        }

        // Drain what the diode still holds, then flush the remainder.
        while let Some(mut envelope) = self.diode.try_next() {
            for processor in &self.processors {
                processor.process(&mut envelope);
            }
            self.tap.set(envelope.clone());
            batch.push(envelope);
            if batch.len() >= self.config.batch_size {
                self.flush(&mut batch).await;
            }
        }
        self.flush(&mut batch).await;

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            envelopes_written = snapshot.envelopes_written,
            dropped = snapshot.dropped,
            "transponder shutting down"
        );
    }

    /// Hand the batch to the writer. Success and failure both clear the
    /// buffer; the batch is never retried at this layer.
    async fn flush(&mut self, batch: &mut Vec<Envelope>) {
        if batch.is_empty() {
            return;
        }

        let count = batch.len() as u64;
        match self.writer.write(batch).await {
            Ok(()) => self.metrics.record_batch_written(count),
            Err(e) => {
                tracing::warn!(error = %e, envelopes = count, "batch write failed, dropping batch");
                self.metrics.record_batch_dropped(count);
            }
        }
        batch.clear();
    }
}

#[cfg(test)]
#[path = "transponder_test.rs"]
mod transponder_test;
