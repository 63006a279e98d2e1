//! Processing seams between pipeline stages
//!
//! `EnvelopeProcessor` is the per-envelope enrichment seam (tagger,
//! aggregator); `BatchWriter` is the egress seam the transponder flushes
//! into. Both are object-safe so the agent can wire stages without
//! generics leaking into the binary.

use async_trait::async_trait;
use carrier_protocol::Envelope;

/// Boxed error for batch writers; the transponder only distinguishes
/// success from failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A per-envelope, in-place processing stage.
pub trait EnvelopeProcessor: Send + Sync {
    /// Enrich or rewrite one envelope. Must not block.
    fn process(&self, envelope: &mut Envelope);
}

/// Destination for flushed batches.
///
/// Implementations own their transport, retry policy, and deadline; from
/// the transponder's view the outcome is a single `Result`.
#[async_trait]
pub trait BatchWriter: Send {
    /// Write one batch. Any error drops the batch at the caller.
    async fn write(&mut self, batch: &[Envelope]) -> Result<(), BoxError>;
}
