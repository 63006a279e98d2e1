//! Length-prefixed frame codec for producer ingress and hub egress
//!
//! Each frame is `[4-byte BE length][1-byte opcode][payload]`; the length
//! covers the opcode and payload. The decoder validates the length against
//! the configured maximum before allocating, and every malformed frame is
//! consumed from the buffer before its error is reported, so callers can
//! drop the frame and keep decoding the same stream.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Length of the frame header
const HEADER_LEN: usize = 4;

/// Default maximum frame size (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame opcodes
///
/// `Send` expects a per-frame acknowledgement; `Stream` and `Batch` are
/// fire-and-forget from the producer's side. `Authority` is a connection
/// preamble granting the producer the right to set its own source id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// One envelope, acknowledged per frame
    Send = 0x01,
    /// One envelope on a long-lived stream, no reply
    Stream = 0x02,
    /// One envelope batch, final acknowledgement on half-close
    Batch = 0x03,
    /// Connection preamble carrying an authority token
    Authority = 0x04,
    /// Empty acknowledgement, agent to producer
    Ack = 0x80,
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Opcode::Send),
            0x02 => Ok(Opcode::Stream),
            0x03 => Ok(Opcode::Batch),
            0x04 => Ok(Opcode::Authority),
            0x80 => Ok(Opcode::Ack),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

/// A decoded frame: opcode plus raw payload bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame from an opcode and an encodable message
    pub fn encode_message(opcode: Opcode, message: &impl prost::Message) -> Self {
        Self {
            opcode,
            payload: Bytes::from(message.encode_to_vec()),
        }
    }

    /// An empty acknowledgement frame
    pub fn ack() -> Self {
        Self {
            opcode: Opcode::Ack,
            payload: Bytes::new(),
        }
    }

    /// Decode the payload as a message of type `M`
    pub fn decode_payload<M: prost::Message + Default>(&self) -> Result<M, ProtocolError> {
        Ok(M::decode(self.payload.clone())?)
    }
}

/// Codec implementing the length-prefixed opcode framing.
///
/// Used with [`tokio_util::codec::Framed`] on both the ingress listener
/// and the hub connection.
///
/// Decode errors leave the stream usable: an oversized frame's body is
/// discarded (across reads, when it is not yet buffered) so the decoder
/// resynchronizes on the next length header, and the other malformed
/// shapes consume their bytes before reporting. Only the transport can
/// wedge the stream.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,

    /// Bytes of an oversized frame's body still to be discarded before
    /// the next header.
    skip_remaining: usize,
}

impl FrameCodec {
    /// Create a codec with the default maximum frame size
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            skip_remaining: 0,
        }
    }

    /// Create a codec with a custom maximum frame size
    #[must_use]
    pub const fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            skip_remaining: 0,
        }
    }

    /// The configured maximum frame size
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        // Finish discarding an oversized frame's body before looking
        // for the next header.
        if self.skip_remaining > 0 {
            let discard = self.skip_remaining.min(src.len());
            src.advance(discard);
            self.skip_remaining -= discard;
            if self.skip_remaining > 0 {
                return Ok(None);
            }
        }

        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut len_bytes = [0u8; HEADER_LEN];
        len_bytes.copy_from_slice(&src[..HEADER_LEN]);
        let len = u32::from_be_bytes(len_bytes) as usize;

        // Validate before reserving; a hostile length prefix must not
        // drive allocation. The declared bytes are consumed, now and as
        // they arrive, so the stream resynchronizes on the next frame.
        if len > self.max_frame_size {
            src.advance(HEADER_LEN);
            let discard = len.min(src.len());
            src.advance(discard);
            self.skip_remaining = len - discard;
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }
        if len == 0 {
            src.advance(HEADER_LEN);
            return Err(ProtocolError::EmptyFrame);
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let mut body = src.split_to(len);
        let opcode = Opcode::try_from(body[0])?;
        body.advance(1);

        Ok(Some(Frame {
            opcode,
            payload: body.freeze(),
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = frame.payload.len() + 1;
        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(HEADER_LEN + len);
        dst.put_u32(len as u32);
        dst.put_u8(frame.opcode as u8);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
#[path = "framing_test.rs"]
mod framing_test;
