//! Agent wiring and lifecycle
//!
//! Builds the pipeline leaves-first, runs until a shutdown signal, then
//! tears down in dependency order: ingress stops accepting, the
//! transponder drains the diode and flushes its final batch, drain
//! writers finish or abandon their queues within the grace period, and
//! the reporter logs a final snapshot.

use std::sync::Arc;
use std::time::Duration;

use carrier_config::Config;
use carrier_diode::{many_to_one, one_to_many, DropAlerter};
use carrier_drains::{
    DrainManager, DrainManagerConfig, FilteredBindingFetcher, HttpBindingFetcher, IpFilter,
};
use carrier_metrics::{MetricsRegistry, MetricsReporter, DEFAULT_REPORT_INTERVAL};
use carrier_pipeline::{
    CounterAggregator, EnvelopeProcessor, Tagger, Transponder, TransponderConfig,
};
use carrier_protocol::Envelope;
use carrier_sinks::{HubWriter, HubWriterConfig};
use carrier_sources::{IngressReceiver, ReceiverConfig};
use tokio_util::sync::CancellationToken;

/// Fatal errors out of `run`, mapped to exit codes in `main`.
#[derive(Debug)]
pub enum ServeError {
    /// The ingress listener could not be bound
    Listener(carrier_sources::SourceError),
    /// Any other fatal startup error
    Startup(anyhow::Error),
}

pub async fn run(config: Config) -> Result<(), ServeError> {
    let registry = Arc::new(MetricsRegistry::new());
    let root = CancellationToken::new();

    // Ingress diode: producers set, the transponder reads. Overflow is
    // ingress-direction loss.
    let ingress_metrics = registry.ingress();
    let overflow_metrics = Arc::clone(&ingress_metrics);
    let overflow_alerter: DropAlerter = Arc::new(move |n| overflow_metrics.record_overflow(n));
    let (diode_tx, diode_rx) = many_to_one::<Envelope>(config.ingress.diode_capacity, overflow_alerter);

    // Tap feeding the drain subsystem.
    let tap = one_to_many::<Envelope>(config.egress.tap_capacity);

    // Drain manager and router, when a binding provider is configured.
    let drains_token = root.child_token();
    let mut drain_tasks = Vec::new();
    if config.drains.enabled() {
        let blacklist = config
            .drains
            .parse_blacklist()
            .map_err(|e| ServeError::Startup(e.into()))?;

        let fetcher = HttpBindingFetcher::new(
            &config.drains.provider_url,
            &config.drains.client_cert_file,
            &config.drains.client_key_file,
            &config.drains.ca_file,
            Duration::from_secs(30),
        )
        .map_err(|e| ServeError::Startup(e.into()))?;

        let filtered = FilteredBindingFetcher::new(
            Box::new(fetcher),
            IpFilter::new(blacklist),
            registry.drains(),
        );

        let manager = DrainManager::new(
            Box::new(filtered),
            DrainManagerConfig {
                poll_interval: config.drains.poll_interval(),
                idle_timeout: config.drains.idle_timeout(),
                max_drains_per_app: config.drains.max_drains_per_app,
                writer_queue_size: config.drains.writer_queue_size,
                backoff_base: config.drains.backoff_base(),
                backoff_cap: config.drains.backoff_cap(),
                housekeeping_interval: config.drains.housekeeping_interval(),
                ca_file: config.drains.ca_file.clone(),
                tls_skip_verify: config.drains.tls_skip_verify,
                shutdown_grace: config.agent.shutdown_grace(),
                ..Default::default()
            },
            &registry,
        )
        .map_err(|e| ServeError::Startup(e.into()))?;

        let tap_alerter: DropAlerter = Arc::new(|n| {
            tracing::debug!(dropped = n, "drain tap lagged, envelopes skipped");
        });
        let router = manager.router(tap.subscribe(tap_alerter));

        drain_tasks.push(tokio::spawn(router.run(drains_token.clone())));
        drain_tasks.push(tokio::spawn(manager.run(drains_token.clone())));
    } else {
        tracing::info!("no binding provider configured, drain manager disabled");
    }

    // Pipeline: tagger + aggregator into the hub writer.
    let processors: Vec<Arc<dyn EnvelopeProcessor>> = vec![
        Arc::new(Tagger::new(
            &config.agent.deployment,
            &config.agent.job,
            &config.agent.index,
            &config.agent.ip,
        )),
        Arc::new(CounterAggregator::new(config.egress.counter_ttl())),
    ];

    let hub = HubWriter::new(
        HubWriterConfig {
            addr: config.egress.hub_addr.clone(),
            server_name: config.egress.hub_server_name.clone(),
            ca_file: config.egress.hub_ca_file.clone(),
            write_deadline: config.egress.write_deadline(),
            ..Default::default()
        },
        registry.egress(),
    )
    .map_err(|e| ServeError::Startup(e.into()))?;

    let transponder = Transponder::new(
        diode_rx,
        hub,
        processors,
        tap,
        TransponderConfig {
            batch_size: config.egress.batch_size,
            batch_interval: config.egress.batch_interval(),
        },
        registry.egress(),
    );
    let pipeline_token = root.child_token();
    let transponder_task = tokio::spawn(transponder.run(pipeline_token.clone()));

    // Ingress last: nothing flows until the rest is wired.
    let receiver = IngressReceiver::bind(
        ReceiverConfig {
            address: config.ingress.address.clone(),
            port: config.ingress.port,
            max_frame_size: config.ingress.max_frame_size,
            default_source_id: config.ingress.default_source_id.clone(),
            authority_token: config.ingress.authority_token.clone(),
            ..Default::default()
        },
        diode_tx,
        ingress_metrics,
    )
    .await
    .map_err(ServeError::Listener)?;

    let ingress_token = root.child_token();
    let receiver_task = tokio::spawn(receiver.run(ingress_token.clone()));

    let reporter = MetricsReporter::new(Arc::clone(&registry), DEFAULT_REPORT_INTERVAL);
    let reporter_task = tokio::spawn(reporter.run(root.child_token()));

    tracing::info!("carrier agent up");

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");

    let grace = config.agent.shutdown_grace();

    // 1. Stop accepting producer traffic.
    ingress_token.cancel();
    let _ = tokio::time::timeout(grace, receiver_task).await;

    // 2. Let the transponder drain the diode, then flush its final
    //    batch.
    tokio::time::sleep(config.egress.batch_interval().min(grace)).await;
    pipeline_token.cancel();
    let _ = tokio::time::timeout(grace, transponder_task).await;

    // 3. Drain writers finish or abandon their queues.
    drains_token.cancel();
    for task in drain_tasks {
        let _ = tokio::time::timeout(grace, task).await;
    }

    // 4. Final metrics snapshot.
    root.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(1), reporter_task).await;

    tracing::info!("carrier agent shut down");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
