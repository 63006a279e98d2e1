//! Ingress receiver - accept loop and configuration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use carrier_diode::ManyToOneSender;
use carrier_metrics::IngressMetrics;
use carrier_protocol::Envelope;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::connection::handle_connection;
use crate::error::{Result, SourceError};

/// Ingress receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Bind address
    pub address: String,

    /// Listen port (0 picks an ephemeral port)
    pub port: u16,

    /// Maximum accepted frame size
    pub max_frame_size: usize,

    /// Source id stamped onto envelopes from producers without authority
    pub default_source_id: String,

    /// Token producers present to keep their own source id; empty
    /// disables the authority path entirely
    pub authority_token: String,

    /// TCP keep-alive interval for producer connections
    pub keepalive_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 3458,
            max_frame_size: 1024 * 1024,
            default_source_id: "carrier-agent".into(),
            authority_token: String::new(),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// The producer-facing receiver. Stateless; every accepted envelope is
/// handed to the ingress diode one at a time.
pub struct IngressReceiver {
    config: Arc<ReceiverConfig>,
    listener: TcpListener,
    diode: ManyToOneSender<Envelope>,
    metrics: Arc<IngressMetrics>,
}

impl IngressReceiver {
    /// Bind the listener. Binding failures are fatal startup errors.
    pub async fn bind(
        config: ReceiverConfig,
        diode: ManyToOneSender<Envelope>,
        metrics: Arc<IngressMetrics>,
    ) -> Result<Self> {
        let addr = format!("{}:{}", config.address, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| SourceError::Bind { addr, source })?;

        Ok(Self {
            config: Arc::new(config),
            listener,
            diode,
            metrics,
        })
    }

    /// The bound address, useful when port 0 was requested.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept producer connections until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        match self.listener.local_addr() {
            Ok(addr) => tracing::info!(%addr, "ingress listening"),
            Err(_) => tracing::info!("ingress listening"),
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "ingress accept failed");
                            continue;
                        }
                    };

                    tracing::debug!(%peer, "producer connected");
                    self.metrics.record_connection_opened();

                    let config = Arc::clone(&self.config);
                    let diode = self.diode.clone();
                    let metrics = Arc::clone(&self.metrics);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer, config, diode, &metrics, shutdown).await;
                        metrics.record_connection_closed();
                        tracing::debug!(%peer, "producer disconnected");
                    });
                }
            }
        }

        tracing::info!(
            received = self.metrics.snapshot().envelopes_received,
            "ingress receiver shutting down"
        );
    }
}

#[cfg(test)]
#[path = "receiver_test.rs"]
mod receiver_test;
