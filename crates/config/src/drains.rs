//! Drain manager configuration

use std::time::Duration;

use ipnet::IpNet;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Default binding poll cadence (seconds)
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default idle drain timeout (seconds)
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default per-app drain cap
const DEFAULT_MAX_DRAINS_PER_APP: usize = 5;

/// Default per-writer queue capacity
const DEFAULT_WRITER_QUEUE_SIZE: usize = 1_000;

/// Default backoff base (milliseconds)
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Default backoff ceiling (milliseconds)
const DEFAULT_BACKOFF_CAP_MS: u64 = 60_000;

/// Default housekeeping tick for idle eviction (seconds)
const DEFAULT_HOUSEKEEPING_SECS: u64 = 10;

/// Syslog drain management configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrainsConfig {
    /// Binding provider endpoint; empty disables the drain manager
    pub provider_url: String,

    /// Client certificate for the binding fetch (PEM), with `client_key_file`
    pub client_cert_file: String,

    /// Client key for the binding fetch (PEM)
    pub client_key_file: String,

    /// CA bundle for the binding provider and syslog-tls drains (empty:
    /// webpki roots)
    pub ca_file: String,

    /// Binding poll cadence, seconds
    pub poll_interval_secs: u64,

    /// Evict a writer after this long with no write activity, seconds
    pub idle_timeout_secs: u64,

    /// Per-app drain cap; excess drains are discarded by URL order
    pub max_drains_per_app: usize,

    /// Destination ranges that are never dialed (CIDR notation)
    pub blacklist_cidrs: Vec<String>,

    /// Disable server certificate verification for syslog-tls drains
    pub tls_skip_verify: bool,

    /// Per-writer queue capacity
    pub writer_queue_size: usize,

    /// Reconnect backoff base, milliseconds
    pub backoff_base_ms: u64,

    /// Reconnect backoff ceiling, milliseconds
    pub backoff_cap_ms: u64,

    /// Housekeeping cadence for idle eviction, seconds
    pub housekeeping_secs: u64,
}

impl Default for DrainsConfig {
    fn default() -> Self {
        Self {
            provider_url: String::new(),
            client_cert_file: String::new(),
            client_key_file: String::new(),
            ca_file: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            max_drains_per_app: DEFAULT_MAX_DRAINS_PER_APP,
            blacklist_cidrs: Vec::new(),
            tls_skip_verify: false,
            writer_queue_size: DEFAULT_WRITER_QUEUE_SIZE,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
            housekeeping_secs: DEFAULT_HOUSEKEEPING_SECS,
        }
    }
}

impl DrainsConfig {
    /// Whether the drain manager should run at all.
    pub fn enabled(&self) -> bool {
        !self.provider_url.is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_secs)
    }

    /// Parse the configured blacklist into CIDR networks.
    ///
    /// Bare addresses are accepted as /32 (or /128) networks.
    pub fn parse_blacklist(&self) -> Result<Vec<IpNet>> {
        self.blacklist_cidrs
            .iter()
            .map(|entry| {
                entry
                    .parse::<IpNet>()
                    .or_else(|_| entry.parse::<std::net::IpAddr>().map(IpNet::from))
                    .map_err(|_| {
                        ConfigError::invalid_value(
                            "drains",
                            "blacklist_cidrs",
                            format!("'{entry}' is not a CIDR range or address"),
                        )
                    })
            })
            .collect()
    }
}
