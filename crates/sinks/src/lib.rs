//! Carrier - Sinks
//!
//! The upstream hub writer: takes batches from the transponder and
//! delivers them over a persistent, encrypted connection pool.
//!
//! # Design
//!
//! - Length-prefixed `BATCH` frames, the same codec producers speak
//! - A small pool of persistent connections with transparent reconnect;
//!   a failed slot is abandoned and the next one tried, all inside the
//!   write deadline
//! - Batches larger than the frame limit are split before writing
//! - TLS via rustls; a plaintext mode exists for local development and
//!   tests and is off by default

mod error;
mod hub;

pub use error::{Result, SinkError};
pub use hub::{HubWriter, HubWriterConfig};
