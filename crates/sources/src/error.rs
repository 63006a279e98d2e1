//! Ingress error types

use thiserror::Error;

/// Result type for ingress operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors from the ingress receiver.
///
/// Only startup errors surface here; per-connection faults are logged
/// and counted without failing the receiver.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Listener could not be bound
    #[error("failed to bind ingress listener on {addr}: {source}")]
    Bind {
        /// Requested bind address
        addr: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Listener failed while accepting
    #[error("ingress accept failed: {0}")]
    Accept(#[from] std::io::Error),
}
