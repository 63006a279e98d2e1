//! Carrier - Sources
//!
//! The producer-facing ingress receiver.
//!
//! # Protocol
//!
//! Producers connect over TCP and speak length-prefixed opcode frames
//! (see `carrier-protocol`). Three logical operations are exposed:
//!
//! - `SEND` - one envelope per frame, acknowledged per frame
//! - `STREAM` - a long-lived sequence of envelopes, no per-envelope reply
//! - `BATCH` - a sequence of envelope batches, one final acknowledgement
//!   when the producer half-closes
//!
//! # Design
//!
//! - Accept loop plus one task per connection, all cancellable
//! - The receiver is stateless: every accepted envelope goes straight
//!   into the ingress diode via `set`, which never blocks
//! - Malformed frames and undecodable envelopes are dropped and counted;
//!   only transport errors terminate a connection
//! - A producer may set its own source id only after presenting the
//!   configured authority token in an `AUTHORITY` preamble frame;
//!   otherwise the receiver's default source id is stamped on

mod connection;
mod error;
mod receiver;

pub use error::{Result, SourceError};
pub use receiver::{IngressReceiver, ReceiverConfig};
