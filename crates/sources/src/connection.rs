//! Per-connection frame handling
//!
//! Each producer connection gets one task running this loop. Malformed
//! frames and envelopes that fail to decode are dropped and counted
//! without disturbing the stream; only transport errors terminate a
//! connection.

use std::net::SocketAddr;
use std::sync::Arc;

use carrier_diode::ManyToOneSender;
use carrier_metrics::IngressMetrics;
use carrier_protocol::{Envelope, EnvelopeBatch, Frame, FrameCodec, Opcode, ProtocolError};
use futures_util::{SinkExt, StreamExt};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::receiver::ReceiverConfig;

pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ReceiverConfig>,
    diode: ManyToOneSender<Envelope>,
    metrics: &IngressMetrics,
    shutdown: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
    }
    let keepalive = TcpKeepalive::new().with_time(config.keepalive_interval);
    if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
        tracing::debug!(%peer, error = %e, "failed to set TCP keep-alive");
    }

    let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_frame_size));
    let mut authorized = false;
    let mut saw_batch = false;
    // After yielding a decode error the framed stream emits one `None`
    // before resuming; that pause must not be mistaken for a half-close.
    let mut decode_error_pause = false;

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return,
            frame = framed.next() => frame,
        };

        match frame {
            Some(Ok(frame)) => {
                decode_error_pause = false;
                match frame.opcode {
                    Opcode::Authority => {
                        authorized = !config.authority_token.is_empty()
                            && frame.payload.as_ref() == config.authority_token.as_bytes();
                        if !authorized {
                            tracing::debug!(%peer, "authority token rejected");
                        }
                    }
                    Opcode::Send => {
                        accept_envelope(&frame, &config, &diode, metrics, authorized);
                        if framed.send(Frame::ack()).await.is_err() {
                            return;
                        }
                    }
                    Opcode::Stream => {
                        accept_envelope(&frame, &config, &diode, metrics, authorized);
                    }
                    Opcode::Batch => {
                        saw_batch = true;
                        match frame.decode_payload::<EnvelopeBatch>() {
                            Ok(batch) => {
                                let per_envelope =
                                    (frame.payload.len() / batch.batch.len().max(1)) as u64;
                                for envelope in batch.batch {
                                    accept_decoded(
                                        envelope,
                                        per_envelope,
                                        &config,
                                        &diode,
                                        metrics,
                                        authorized,
                                    );
                                }
                            }
                            Err(_) => metrics.record_malformed(),
                        }
                    }
                    Opcode::Ack => {
                        // Producers never send acks; drop it like any
                        // other malformed frame.
                        metrics.record_malformed();
                        tracing::debug!(%peer, "dropping unexpected ack from producer");
                    }
                }
            }
            Some(Err(ProtocolError::Io(e))) => {
                tracing::debug!(%peer, error = %e, "producer connection error");
                return;
            }
            Some(Err(e)) => {
                // Oversized, empty, or unknown-opcode frame: the codec
                // already consumed its bytes, so drop it and keep
                // reading.
                metrics.record_malformed();
                tracing::debug!(%peer, error = %e, "dropping malformed frame");
                decode_error_pause = true;
            }
            None => {
                if decode_error_pause {
                    decode_error_pause = false;
                    continue;
                }
                // Half-close: finish the batch-send exchange with the
                // final empty acknowledgement.
                if saw_batch {
                    let _ = framed.send(Frame::ack()).await;
                }
                return;
            }
        }
    }
}

fn accept_envelope(
    frame: &Frame,
    config: &ReceiverConfig,
    diode: &ManyToOneSender<Envelope>,
    metrics: &IngressMetrics,
    authorized: bool,
) {
    match frame.decode_payload::<Envelope>() {
        Ok(envelope) => accept_decoded(
            envelope,
            frame.payload.len() as u64,
            config,
            diode,
            metrics,
            authorized,
        ),
        Err(_) => metrics.record_malformed(),
    }
}

fn accept_decoded(
    mut envelope: Envelope,
    bytes: u64,
    config: &ReceiverConfig,
    diode: &ManyToOneSender<Envelope>,
    metrics: &IngressMetrics,
    authorized: bool,
) {
    if !envelope.is_well_formed() {
        metrics.record_malformed();
        return;
    }

    // Without authority the receiver's identity always wins; with it the
    // default only fills a gap.
    if envelope.source_id.is_empty() || !authorized {
        envelope.source_id = config.default_source_id.clone();
    }

    metrics.record_received(bytes);
    diode.set(envelope);
}
