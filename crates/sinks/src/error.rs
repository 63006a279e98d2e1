//! Sink error types

use thiserror::Error;

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors from the hub writer.
#[derive(Debug, Error)]
pub enum SinkError {
    /// TLS configuration could not be built at startup
    #[error("hub TLS configuration: {0}")]
    Tls(String),

    /// Connection to the hub failed
    #[error("connection to hub {addr} failed: {source}")]
    Connect {
        /// Hub address
        addr: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Write failed mid-batch
    #[error("hub write failed: {0}")]
    Write(#[from] std::io::Error),

    /// The write deadline elapsed
    #[error("hub write deadline of {0:?} elapsed")]
    Deadline(std::time::Duration),

    /// A single envelope exceeds the frame limit even alone
    #[error("envelope of {size} bytes exceeds frame limit {limit}")]
    EnvelopeTooLarge {
        /// Encoded envelope size
        size: usize,
        /// Frame limit
        limit: usize,
    },
}
