//! Ingress receiver configuration

use serde::Deserialize;

/// Default ingress port
const DEFAULT_PORT: u16 = 3458;

/// Default diode capacity (rounded up to 16384 by the ring)
const DEFAULT_DIODE_CAPACITY: usize = 10_000;

/// Default maximum ingress frame size (1 MiB)
const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Producer-facing ingress configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Bind address
    pub address: String,

    /// Listen port for producers
    pub port: u16,

    /// Ring size for the ingress diode (power of two recommended)
    pub diode_capacity: usize,

    /// Maximum accepted frame size in bytes
    pub max_frame_size: usize,

    /// Source id stamped onto envelopes that arrive without one
    pub default_source_id: String,

    /// Shared token producers present to set their own source id
    pub authority_token: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            diode_capacity: DEFAULT_DIODE_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            default_source_id: "carrier-agent".into(),
            authority_token: String::new(),
        }
    }
}
