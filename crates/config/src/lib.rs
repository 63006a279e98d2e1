//! Carrier Configuration
//!
//! TOML-based configuration loading with sensible defaults. A minimal
//! config only needs the hub address and the binding provider URL; every
//! other option has a default.
//!
//! # Example Minimal Config
//!
//! ```toml
//! [egress]
//! hub_addr = "hub.internal:8082"
//!
//! [drains]
//! provider_url = "https://bindings.internal:8083/v2/bindings"
//! ```
//!
//! # Parsing
//!
//! ```
//! use std::str::FromStr;
//! use carrier_config::Config;
//!
//! let config = Config::from_str("[egress]\nhub_addr = \"hub:8082\"").unwrap();
//! assert_eq!(config.ingress.port, 3458);
//! ```

mod agent;
mod drains;
mod egress;
mod error;
mod ingress;
mod logging;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use agent::AgentConfig;
pub use drains::DrainsConfig;
pub use egress::EgressConfig;
pub use error::{ConfigError, Result};
pub use ingress::IngressConfig;
pub use logging::LogConfig;

/// Main configuration structure
///
/// All sections are optional with defaults; validation runs after
/// parsing and is the only fatal error surface in the agent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent identity (tags stamped onto every envelope)
    pub agent: AgentConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Producer-facing ingress
    pub ingress: IngressConfig,

    /// Batching and the upstream hub
    pub egress: EgressConfig,

    /// Syslog drain management
    pub drains: DrainsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid
    /// TOML, or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.egress.hub_addr.is_empty() {
            return Err(ConfigError::missing_field("egress", "hub_addr"));
        }
        if self.egress.batch_size == 0 {
            return Err(ConfigError::invalid_value(
                "egress",
                "batch_size",
                "must be at least 1",
            ));
        }
        if self.egress.batch_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "egress",
                "batch_interval_ms",
                "must be at least 1",
            ));
        }
        if self.ingress.diode_capacity < 2 {
            return Err(ConfigError::invalid_value(
                "ingress",
                "diode_capacity",
                "must be at least 2",
            ));
        }
        if self.drains.max_drains_per_app == 0 {
            return Err(ConfigError::invalid_value(
                "drains",
                "max_drains_per_app",
                "must be at least 1",
            ));
        }
        self.drains.parse_blacklist()?;
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
