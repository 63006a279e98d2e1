//! Agent identity configuration

use serde::Deserialize;

/// Identity tags stamped onto envelopes that do not already carry them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Deployment name (tag `deployment`)
    pub deployment: String,

    /// Job name (tag `job`)
    pub job: String,

    /// Instance index (tag `index`)
    pub index: String,

    /// Host address (tag `ip`)
    pub ip: String,

    /// Grace period for cooperative shutdown, seconds
    pub shutdown_grace_secs: u64,
}

impl AgentConfig {
    /// Effective shutdown grace period (defaults to 10s when unset).
    pub fn shutdown_grace(&self) -> std::time::Duration {
        let secs = if self.shutdown_grace_secs == 0 {
            10
        } else {
            self.shutdown_grace_secs
        };
        std::time::Duration::from_secs(secs)
    }
}
