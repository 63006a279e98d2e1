//! Drain subsystem error types

use thiserror::Error;

/// Result type for drain operations
pub type Result<T> = std::result::Result<T, DrainError>;

/// Errors from binding fetch, validation, and drain writers.
///
/// None of these fail the process; fetch errors are retried on the next
/// cycle and writer errors feed the backoff state machine.
#[derive(Debug, Error)]
pub enum DrainError {
    /// Binding provider request failed
    #[error("binding fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Binding provider returned an unexpected payload
    #[error("binding response invalid: {0}")]
    BadResponse(#[from] serde_json::Error),

    /// mTLS client material could not be loaded at startup
    #[error("binding client TLS configuration: {0}")]
    ClientTls(String),

    /// Drain URL failed validation
    #[error("invalid drain url '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL as configured
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Drain host resolved into the blacklist
    #[error("drain host '{host}' resolves to blacklisted address {addr}")]
    Blacklisted {
        /// Hostname from the drain URL
        host: String,
        /// The blacklisted address
        addr: std::net::IpAddr,
    },

    /// Drain host could not be resolved
    #[error("failed to resolve drain host '{host}': {source}")]
    Resolve {
        /// Hostname from the drain URL
        host: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Connection to a drain failed
    #[error("drain connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Write to a drain failed
    #[error("drain write failed: {0}")]
    Write(#[source] std::io::Error),

    /// An envelope could not be rendered into the drain's format
    #[error("envelope could not be formatted: {0}")]
    Format(String),
}
