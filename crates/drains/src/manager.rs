//! Drain manager - binding polling, publication, and the writer pool
//!
//! The manager polls the (filtered) binding reader, builds a
//! `BindingSet` with the per-tenant cap applied, publishes it as an
//! atomic snapshot swap, and reconciles the writer pool: new URLs get a
//! writer (not yet dialed), vanished URLs get a cooperative shutdown
//! after draining. A housekeeping tick reaps writers that evicted
//! themselves on idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use carrier_diode::{one_to_one, DropAlerter, OneToOneSender, Subscriber, Wakeful};
use carrier_metrics::{DrainMetrics, DrainScopedMetrics, MetricsRegistry};
use carrier_protocol::Envelope;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backoff::Backoff;
use crate::binding::{BindingSet, DrainSpec};
use crate::error::Result;
use crate::fetcher::BindingReader;
use crate::router::DrainRouter;
use crate::transport::TransportFactory;
use crate::writer::{DrainWriter, WriterExit};

/// Drain manager tuning
#[derive(Debug, Clone)]
pub struct DrainManagerConfig {
    /// Binding poll cadence
    pub poll_interval: Duration,

    /// Evict a writer after this long with no write activity
    pub idle_timeout: Duration,

    /// Per-tenant drain cap
    pub max_drains_per_app: usize,

    /// Per-writer queue capacity
    pub writer_queue_size: usize,

    /// Reconnect backoff base
    pub backoff_base: Duration,

    /// Reconnect backoff ceiling
    pub backoff_cap: Duration,

    /// Housekeeping cadence (idle reap, writer bookkeeping)
    pub housekeeping_interval: Duration,

    /// CA bundle for syslog-tls and https drains (empty: webpki roots)
    pub ca_file: String,

    /// Disable drain server certificate verification
    pub tls_skip_verify: bool,

    /// Connect timeout per dial
    pub connect_timeout: Duration,

    /// Write timeout per message
    pub write_timeout: Duration,

    /// Grace period for writers to finish at shutdown
    pub shutdown_grace: Duration,
}

impl Default for DrainManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(600),
            max_drains_per_app: 5,
            writer_queue_size: 1_000,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            housekeeping_interval: Duration::from_secs(10),
            ca_file: String::new(),
            tls_skip_verify: false,
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// The drain management subsystem.
pub struct DrainManager {
    fetcher: Box<dyn BindingReader>,
    published: Arc<RwLock<Arc<BindingSet>>>,
    pool: Arc<WriterPool>,
    config: DrainManagerConfig,
    metrics: Arc<DrainMetrics>,
}

impl DrainManager {
    /// Build the manager. TLS configuration problems are fatal here, at
    /// startup.
    pub fn new(
        fetcher: Box<dyn BindingReader>,
        config: DrainManagerConfig,
        registry: &Arc<MetricsRegistry>,
    ) -> Result<Self> {
        let transports = Arc::new(TransportFactory::new(
            &config.ca_file,
            config.tls_skip_verify,
            config.connect_timeout,
            config.write_timeout,
        )?);

        let metrics = registry.drains();
        let pool = Arc::new(WriterPool {
            inner: Mutex::new(HashMap::new()),
            transports,
            registry: Arc::clone(registry),
            drain_metrics: Arc::clone(&metrics),
            queue_size: config.writer_queue_size,
            backoff_base: config.backoff_base,
            backoff_cap: config.backoff_cap,
            idle_timeout: config.idle_timeout,
        });

        Ok(Self {
            fetcher,
            published: Arc::new(RwLock::new(Arc::new(BindingSet::default()))),
            pool,
            config,
            metrics,
        })
    }

    /// Build the router fed by `tap`. Shares the published snapshot and
    /// the writer pool with this manager.
    pub fn router(&self, tap: Subscriber<Envelope>) -> DrainRouter {
        DrainRouter::new(tap, Arc::clone(&self.published), Arc::clone(&self.pool))
    }

    /// Run until cancelled: poll, publish, reconcile, housekeep.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            idle_timeout_secs = self.config.idle_timeout.as_secs(),
            max_drains_per_app = self.config.max_drains_per_app,
            "drain manager starting"
        );

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut housekeeping = tokio::time::interval(self.config.housekeeping_interval);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => self.fetch_and_publish(&shutdown).await,
                _ = housekeeping.tick() => self.pool.reap_finished(),
                _ = shutdown.cancelled() => break,
            }
        }

        self.pool.shutdown_all(self.config.shutdown_grace).await;
        tracing::info!("drain manager shut down");
    }

    async fn fetch_and_publish(&self, shutdown: &CancellationToken) {
        match self.fetcher.fetch_bindings().await {
            Ok(bindings) => {
                self.metrics.record_fetch();
                let (set, discarded) =
                    BindingSet::build(&bindings, self.config.max_drains_per_app);
                if discarded > 0 {
                    self.metrics.record_over_limit(discarded);
                    tracing::warn!(discarded, "discarded drains over the per-app cap");
                }

                let set = Arc::new(set);
                let previous = {
                    let mut published = self.published.write();
                    std::mem::replace(&mut *published, Arc::clone(&set))
                };
                self.pool.sync(&previous, &set, shutdown);

                tracing::debug!(
                    bindings = bindings.len(),
                    drains = set.all_urls().len(),
                    "published binding set"
                );
            }
            Err(e) => {
                self.metrics.record_fetch_failure();
                tracing::warn!(error = %e, "binding fetch failed, keeping previous set");
            }
        }
    }
}

struct WriterEntry {
    spec: Arc<DrainSpec>,
    queue: Wakeful<OneToOneSender<Envelope>>,
    metrics: Arc<DrainScopedMetrics>,
    cancel: CancellationToken,
    task: JoinHandle<WriterExit>,
}

/// URL-keyed writer pool. One mutex guards the map; per-writer state is
/// owned by the writer task and reached only through its queue.
pub(crate) struct WriterPool {
    inner: Mutex<HashMap<String, WriterEntry>>,
    transports: Arc<TransportFactory>,
    registry: Arc<MetricsRegistry>,
    drain_metrics: Arc<DrainMetrics>,
    queue_size: usize,
    backoff_base: Duration,
    backoff_cap: Duration,
    idle_timeout: Duration,
}

impl WriterPool {
    fn spawn_writer(&self, spec: Arc<DrainSpec>, parent: &CancellationToken) -> WriterEntry {
        let metrics = self.registry.drain_scoped(&spec.raw_url);

        let overflow_metrics = Arc::clone(&metrics);
        let alerter: DropAlerter = Arc::new(move |n| overflow_metrics.record_queue_dropped(n));
        let (tx, rx) = one_to_one(self.queue_size, alerter);
        let (queue, wakeup) = Wakeful::new(tx);

        let cancel = parent.child_token();
        let writer = DrainWriter::new(
            Arc::clone(&spec),
            rx,
            wakeup,
            Arc::clone(&self.transports),
            Backoff::new(self.backoff_base, self.backoff_cap),
            self.idle_timeout,
            Arc::clone(&metrics),
        );

        self.drain_metrics.record_writer_started();
        let drain_metrics = Arc::clone(&self.drain_metrics);
        let writer_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let exit = writer.run(writer_cancel).await;
            if exit == WriterExit::IdleTimeout {
                drain_metrics.record_idle_eviction();
            }
            drain_metrics.record_writer_stopped();
            exit
        });

        WriterEntry {
            spec,
            queue,
            metrics,
            cancel,
            task,
        }
    }

    /// Reconcile the pool with a freshly published set.
    ///
    /// Writers are created only for URLs newly present relative to the
    /// previous publication; a writer that idle-evicted while its URL
    /// stayed bound is re-created by the next envelope, not by the next
    /// poll.
    pub(crate) fn sync(
        &self,
        previous: &BindingSet,
        current: &BindingSet,
        parent: &CancellationToken,
    ) {
        let desired: HashMap<String, Arc<DrainSpec>> = current
            .all_specs()
            .into_iter()
            .map(|spec| (spec.raw_url.clone(), spec))
            .collect();
        let previous_urls = previous.all_urls();

        let mut inner = self.inner.lock();

        inner.retain(|url, entry| {
            if desired.contains_key(url) {
                true
            } else {
                tracing::debug!(drain = %url, "drain removed from bindings, shutting writer down");
                entry.cancel.cancel();
                false
            }
        });

        for (url, spec) in desired {
            if previous_urls.binary_search(&url).is_ok() {
                continue;
            }
            inner
                .entry(url)
                .or_insert_with(|| self.spawn_writer(spec, parent));
        }
    }

    /// Enqueue one envelope for a drain, re-creating the writer when an
    /// idle eviction already took it down.
    pub(crate) fn enqueue(&self, spec: &Arc<DrainSpec>, envelope: &Envelope, parent: &CancellationToken) {
        let mut inner = self.inner.lock();
        let entry = inner
            .entry(spec.raw_url.clone())
            .or_insert_with(|| self.spawn_writer(Arc::clone(spec), parent));

        if entry.task.is_finished() {
            *entry = self.spawn_writer(Arc::clone(&entry.spec), parent);
        }

        entry.metrics.record_enqueued();
        entry.queue.set(envelope.clone());
    }

    /// Drop entries whose tasks already finished (idle evictions).
    pub(crate) fn reap_finished(&self) {
        self.inner.lock().retain(|_, entry| !entry.task.is_finished());
    }

    /// Cancel every writer and wait up to `grace` for each to finish.
    pub(crate) async fn shutdown_all(&self, grace: Duration) {
        let entries: Vec<WriterEntry> = {
            let mut inner = self.inner.lock();
            inner.drain().map(|(_, entry)| entry).collect()
        };

        for entry in &entries {
            entry.cancel.cancel();
        }
        for entry in entries {
            let url = entry.spec.raw_url.clone();
            let abort = entry.task.abort_handle();
            match tokio::time::timeout(grace, entry.task).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(drain = %url, "writer did not finish within grace period, abandoning");
                    abort.abort();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
