//! Hub writer - batch egress toward the upstream collector
//!
//! # Design
//!
//! The writer keeps a small pool of persistent connections. A batch
//! write picks the next slot, connecting it first if needed, and falls
//! over to the remaining slots on error; the whole attempt is bounded by
//! the write deadline. Oversize batches are split by encoded size before
//! anything touches the wire.
//!
//! From the transponder's view the outcome is a single `Result`; all
//! retry lives inside the deadline.

mod tls;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use carrier_metrics::EgressMetrics;
use carrier_pipeline::{BatchWriter, BoxError};
use carrier_protocol::{Envelope, EnvelopeBatch, Frame, FrameCodec, Opcode};
use prost::Message as _;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Encoder;

use crate::error::{Result, SinkError};

/// Per-envelope framing overhead inside an `EnvelopeBatch`: one key byte
/// plus up to five varint length bytes.
const ENVELOPE_OVERHEAD: usize = 6;

/// Hub writer configuration
#[derive(Debug, Clone)]
pub struct HubWriterConfig {
    /// Hub address as host:port
    pub addr: String,

    /// Server name presented for TLS verification; empty uses the host
    /// part of `addr`
    pub server_name: String,

    /// CA bundle path; empty uses the webpki roots
    pub ca_file: String,

    /// Encrypt the connection (plaintext is for local development only)
    pub tls_enabled: bool,

    /// Number of pooled connections
    pub pool_size: usize,

    /// Deadline for one batch write, including any reconnects
    pub write_deadline: Duration,

    /// Connect timeout per attempt
    pub connect_timeout: Duration,

    /// Frame limit; batches are split to fit
    pub max_frame_size: usize,

    /// TCP keep-alive interval
    pub keepalive_interval: Duration,
}

impl Default for HubWriterConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            server_name: String::new(),
            ca_file: String::new(),
            tls_enabled: true,
            pool_size: 2,
            write_deadline: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_frame_size: 1024 * 1024,
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

type Conn = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// Batch egress writer toward the hub.
pub struct HubWriter {
    config: HubWriterConfig,
    tls: Option<tls::HubTls>,
    pool: Vec<Option<Conn>>,
    next: usize,
    metrics: Arc<EgressMetrics>,
}

impl std::fmt::Debug for HubWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubWriter")
            .field("config", &self.config)
            .field("pool_size", &self.pool.len())
            .field("next", &self.next)
            .finish()
    }
}

impl HubWriter {
    /// Build the writer. TLS configuration problems are fatal here, at
    /// startup; nothing is dialed yet.
    pub fn new(config: HubWriterConfig, metrics: Arc<EgressMetrics>) -> Result<Self> {
        let tls = if config.tls_enabled {
            Some(tls::HubTls::build(
                &config.addr,
                &config.server_name,
                &config.ca_file,
            )?)
        } else {
            None
        };

        let pool_size = config.pool_size.max(1);
        let mut pool = Vec::with_capacity(pool_size);
        pool.resize_with(pool_size, || None);

        Ok(Self {
            config,
            tls,
            pool,
            next: 0,
            metrics,
        })
    }

    /// Write one batch within the deadline.
    pub async fn write_batch(&mut self, batch: &[Envelope]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let frames = self.encode_frames(batch)?;
        let deadline = self.config.write_deadline;
        timeout(deadline, self.write_with_failover(&frames))
            .await
            .map_err(|_| SinkError::Deadline(deadline))?
    }

    /// Try each pool slot once, reconnecting cold slots on the way.
    async fn write_with_failover(&mut self, frames: &[BytesMut]) -> Result<()> {
        let mut last_err = None;

        for _ in 0..self.pool.len() {
            let slot = self.next;
            self.next = (self.next + 1) % self.pool.len();

            if self.pool[slot].is_none() {
                match self.connect().await {
                    Ok(conn) => {
                        self.metrics.record_reconnect();
                        self.pool[slot] = Some(conn);
                    }
                    Err(e) => {
                        last_err = Some(e);
                        continue;
                    }
                }
            }

            // The slot is occupied at this point.
            let Some(conn) = self.pool[slot].as_mut() else {
                continue;
            };
            match write_frames(conn, frames).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(slot, error = %e, "hub connection failed, abandoning slot");
                    self.pool[slot] = None;
                    last_err = Some(SinkError::Write(e));
                }
            }
        }

        Err(last_err.unwrap_or(SinkError::Deadline(self.config.write_deadline)))
    }

    async fn connect(&self) -> Result<Conn> {
        let stream = timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.addr),
        )
        .await
        .map_err(|_| SinkError::Connect {
            addr: self.config.addr.clone(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        })?
        .map_err(|source| SinkError::Connect {
            addr: self.config.addr.clone(),
            source,
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY on hub connection");
        }
        let keepalive = TcpKeepalive::new().with_time(self.config.keepalive_interval);
        if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            tracing::debug!(error = %e, "failed to set TCP keep-alive on hub connection");
        }

        match &self.tls {
            Some(tls) => {
                let stream = tls.connect(stream).await.map_err(|source| SinkError::Connect {
                    addr: self.config.addr.clone(),
                    source,
                })?;
                tracing::debug!(addr = %self.config.addr, "connected to hub (tls)");
                Ok(Box::new(stream))
            }
            None => {
                tracing::debug!(addr = %self.config.addr, "connected to hub (plaintext)");
                Ok(Box::new(stream))
            }
        }
    }

    /// Encode the batch into one or more `BATCH` frames, splitting by
    /// encoded size. An envelope too large even alone is skipped and
    /// logged; it cannot be delivered at any split.
    fn encode_frames(&self, batch: &[Envelope]) -> Result<Vec<BytesMut>> {
        let limit = self.config.max_frame_size;
        let mut codec = FrameCodec::with_max_size(limit);
        let mut frames = Vec::new();

        let mut chunk: Vec<Envelope> = Vec::new();
        let mut chunk_size = 1; // opcode byte

        let mut flush_chunk =
            |chunk: &mut Vec<Envelope>, chunk_size: &mut usize| -> Result<()> {
                if chunk.is_empty() {
                    return Ok(());
                }
                let message = EnvelopeBatch {
                    batch: std::mem::take(chunk),
                };
                let mut buf = BytesMut::new();
                codec
                    .encode(Frame::encode_message(Opcode::Batch, &message), &mut buf)
                    .map_err(|e| {
                        SinkError::Write(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            e.to_string(),
                        ))
                    })?;
                frames.push(buf);
                *chunk_size = 1;
                Ok(())
            };

        for envelope in batch {
            let size = envelope.encoded_len() + ENVELOPE_OVERHEAD;
            if size + 1 > limit {
                tracing::warn!(
                    size,
                    limit,
                    source_id = %envelope.source_id,
                    "envelope exceeds frame limit even alone, skipping"
                );
                continue;
            }
            if chunk_size + size > limit {
                flush_chunk(&mut chunk, &mut chunk_size)?;
            }
            chunk_size += size;
            chunk.push(envelope.clone());
        }
        flush_chunk(&mut chunk, &mut chunk_size)?;

        Ok(frames)
    }
}

async fn write_frames(conn: &mut Conn, frames: &[BytesMut]) -> std::io::Result<()> {
    for frame in frames {
        conn.write_all(frame).await?;
    }
    conn.flush().await
}

#[async_trait]
impl BatchWriter for HubWriter {
    async fn write(&mut self, batch: &[Envelope]) -> std::result::Result<(), BoxError> {
        self.write_batch(batch).await.map_err(Into::into)
    }
}
