//! Transponder tests
//!
//! A recording writer stands in for the hub: it captures batches and can
//! be told to fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use carrier_diode::{many_to_one, noop_alerter, one_to_many, ManyToOneSender};
use carrier_protocol::LogType;
use parking_lot::Mutex;

use super::*;
use crate::processor::BoxError;
use crate::{CounterAggregator, Tagger};

#[derive(Default)]
struct RecordingWriter {
    batches: Arc<Mutex<Vec<Vec<Envelope>>>>,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl BatchWriter for RecordingWriter {
    async fn write(&mut self, batch: &[Envelope]) -> Result<(), BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err("write error".into());
        }
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }
}

struct Harness {
    diode: ManyToOneSender<Envelope>,
    batches: Arc<Mutex<Vec<Vec<Envelope>>>>,
    fail: Arc<AtomicBool>,
    metrics: Arc<EgressMetrics>,
    shutdown: CancellationToken,
}

fn start(config: TransponderConfig, processors: Vec<Arc<dyn EnvelopeProcessor>>) -> Harness {
    let (tx, rx) = many_to_one(1024, noop_alerter());
    let writer = RecordingWriter::default();
    let batches = Arc::clone(&writer.batches);
    let fail = Arc::clone(&writer.fail);
    let metrics = Arc::new(EgressMetrics::new());
    let shutdown = CancellationToken::new();

    let transponder = Transponder::new(
        rx,
        writer,
        processors,
        one_to_many(64),
        config,
        Arc::clone(&metrics),
    );
    tokio::spawn(transponder.run(shutdown.clone()));

    Harness {
        diode: tx,
        batches,
        fail,
        metrics,
        shutdown,
    }
}

async fn wait_for_batches(
    batches: &Arc<Mutex<Vec<Vec<Envelope>>>>,
    count: usize,
) -> Vec<Vec<Envelope>> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if batches.lock().len() >= count {
                return batches.lock().clone();
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("batches did not arrive")
}

fn log_envelope(text: &str) -> Envelope {
    Envelope::log("app", text.as_bytes().to_vec(), LogType::Out)
}

#[tokio::test(start_paused = true)]
async fn test_single_envelope_flushes_on_interval() {
    let harness = start(
        TransponderConfig {
            batch_size: 100,
            batch_interval: Duration::from_millis(50),
        },
        Vec::new(),
    );

    harness.diode.set(log_envelope("hi"));

    let batches = wait_for_batches(&harness.batches, 1).await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].as_log().unwrap().payload, b"hi");

    harness.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_flushes_when_batch_size_reached() {
    let harness = start(
        TransponderConfig {
            batch_size: 5,
            // An interval long enough that only the size trigger fires.
            batch_interval: Duration::from_secs(3600),
        },
        Vec::new(),
    );

    for i in 0..5 {
        harness.diode.set(log_envelope(&format!("m{i}")));
    }

    let batches = wait_for_batches(&harness.batches, 1).await;
    assert_eq!(batches[0].len(), 5);
    assert_eq!(harness.metrics.snapshot().envelopes_written, 5);

    harness.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_batches_never_exceed_batch_size() {
    let harness = start(
        TransponderConfig {
            batch_size: 4,
            batch_interval: Duration::from_millis(50),
        },
        Vec::new(),
    );

    for i in 0..10 {
        harness.diode.set(log_envelope(&format!("m{i}")));
    }

    let batches = wait_for_batches(&harness.batches, 3).await;
    let total: usize = batches.iter().map(Vec::len).sum();
    assert_eq!(total, 10);
    for batch in &batches {
        assert!(batch.len() <= 4);
    }

    harness.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_drops_batch_and_continues() {
    let harness = start(
        TransponderConfig {
            batch_size: 1,
            batch_interval: Duration::from_millis(10),
        },
        Vec::new(),
    );

    harness.fail.store(true, Ordering::Relaxed);
    harness.diode.set(log_envelope("doomed"));

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.metrics.snapshot().dropped == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("drop not recorded");
    assert_eq!(harness.metrics.snapshot().dropped, 1);
    assert_eq!(harness.metrics.snapshot().write_errors, 1);

    // Recovery: the next envelope flows.
    harness.fail.store(false, Ordering::Relaxed);
    harness.diode.set(log_envelope("survivor"));

    let batches = wait_for_batches(&harness.batches, 1).await;
    assert_eq!(batches[0][0].as_log().unwrap().payload, b"survivor");

    harness.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_processors_run_before_batching() {
    let aggregator = Arc::new(CounterAggregator::new(Duration::from_secs(60)));
    let tagger = Arc::new(Tagger::new("dep", "job", "0", "1.2.3.4"));
    let harness = start(
        TransponderConfig {
            batch_size: 4,
            batch_interval: Duration::from_millis(10),
        },
        vec![tagger, aggregator],
    );

    for _ in 0..4 {
        harness.diode.set(Envelope::counter("app", "hits", 5));
    }

    let batches = wait_for_batches(&harness.batches, 1).await;
    let batch = &batches[0];

    // Tagged...
    assert_eq!(batch[0].tags["deployment"], "dep");
    // ...and aggregated in arrival order.
    let totals: Vec<u64> = batch
        .iter()
        .map(|e| e.as_counter().unwrap().total)
        .collect();
    assert_eq!(totals, vec![5, 10, 15, 20]);

    harness.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_final_flush_on_shutdown() {
    let harness = start(
        TransponderConfig {
            batch_size: 100,
            batch_interval: Duration::from_secs(3600),
        },
        Vec::new(),
    );

    harness.diode.set(log_envelope("parting"));
    // Give the transponder a beat to buffer it, then cancel.
    tokio::time::sleep(Duration::from_millis(5)).await;
    harness.shutdown.cancel();

    let batches = wait_for_batches(&harness.batches, 1).await;
    assert_eq!(batches[0][0].as_log().unwrap().payload, b"parting");
}
