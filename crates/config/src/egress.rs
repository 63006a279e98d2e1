//! Egress (batching and hub) configuration

use std::time::Duration;

use serde::Deserialize;

/// Default transponder batch size (envelopes)
const DEFAULT_BATCH_SIZE: usize = 100;

/// Default transponder batch interval (milliseconds)
const DEFAULT_BATCH_INTERVAL_MS: u64 = 100;

/// Default counter aggregator entry TTL (seconds)
const DEFAULT_COUNTER_TTL_SECS: u64 = 120;

/// Default deadline for one batch write toward the hub (seconds)
const DEFAULT_WRITE_DEADLINE_SECS: u64 = 10;

/// Default capacity of the tap ring feeding the drain manager
const DEFAULT_TAP_CAPACITY: usize = 10_000;

/// Batching and upstream hub configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EgressConfig {
    /// Hub address as host:port (required)
    pub hub_addr: String,

    /// Server name for hub TLS verification; defaults to the host part
    /// of `hub_addr`
    pub hub_server_name: String,

    /// Path to the CA bundle used to verify the hub (empty: webpki roots)
    pub hub_ca_file: String,

    /// Flush when the batch reaches this many envelopes
    pub batch_size: usize,

    /// Flush when this much time has passed since the batch's first
    /// envelope, milliseconds
    pub batch_interval_ms: u64,

    /// Counter aggregator entry TTL, seconds
    pub counter_ttl_secs: u64,

    /// Deadline for one batch write, seconds
    pub write_deadline_secs: u64,

    /// Ring size of the tap feeding the drain manager
    pub tap_capacity: usize,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            hub_addr: String::new(),
            hub_server_name: String::new(),
            hub_ca_file: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            counter_ttl_secs: DEFAULT_COUNTER_TTL_SECS,
            write_deadline_secs: DEFAULT_WRITE_DEADLINE_SECS,
            tap_capacity: DEFAULT_TAP_CAPACITY,
        }
    }
}

impl EgressConfig {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn counter_ttl(&self) -> Duration {
        Duration::from_secs(self.counter_ttl_secs)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }
}
