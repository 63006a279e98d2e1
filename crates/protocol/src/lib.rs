//! Carrier - Protocol
//!
//! The envelope data model and the wire framing shared by ingress and
//! egress.
//!
//! # Envelope
//!
//! `Envelope` is the unit of data that flows through the agent: a
//! timestamp, a source identifier, an instance identifier, a tag map, and
//! exactly one payload variant (log, counter, gauge, timer, or event).
//! The prost field tags match the existing envelope schema, so encoded
//! bytes are wire-compatible with producers and collectors already
//! speaking it.
//!
//! # Framing
//!
//! ```text
//! +----------------------+--------+------------------+
//! | Length (4 bytes, BE) | Opcode | Payload          |
//! +----------------------+--------+------------------+
//! ```
//!
//! The length covers the opcode byte plus the payload. Frame size is
//! validated against a bounded maximum before any allocation.

mod envelope;
mod error;
mod framing;
mod key;

pub use envelope::{
    Counter, Envelope, EnvelopeBatch, Event, Gauge, GaugeValue, Log, LogType, Message, Timer,
};
pub use error::{ProtocolError, Result};
pub use framing::{Frame, FrameCodec, Opcode, DEFAULT_MAX_FRAME_SIZE};
pub use key::CounterKey;

/// Default maximum envelopes per egress batch
pub const DEFAULT_BATCH_SIZE: usize = 100;
