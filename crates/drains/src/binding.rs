//! Binding and drain types
//!
//! A binding maps one tenant (app id) to its drain destinations. The
//! wire shape mirrors the binding provider's JSON; `DrainSpec` is the
//! validated, parsed form the manager and writers work with.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

/// Drain scope: whose envelopes flow to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainScope {
    /// Only the binding tenant's envelopes
    #[default]
    App,
    /// Every envelope the agent sees
    Aggregate,
}

/// Syslog output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogFormat {
    /// RFC 5424 with structured data (default)
    #[default]
    Rfc5424,
    /// RFC 3164 legacy
    Rfc3164,
}

/// One drain as fetched from the binding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Drain {
    /// Destination URL (`syslog://`, `syslog-tls://`, or `https://`)
    pub url: String,

    /// Scope; `app` when absent
    #[serde(default)]
    pub scope: DrainScope,

    /// Opaque credentials reference, passed through unexamined
    #[serde(default)]
    pub credentials: Option<serde_json::Value>,

    /// Output format; RFC 5424 when absent
    #[serde(default)]
    pub format: SyslogFormat,
}

/// One binding as fetched from the binding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Binding {
    /// Tenant identifier matched against envelope source ids
    pub app_id: String,

    /// Hostname label emitted in syslog headers
    #[serde(default)]
    pub hostname: String,

    /// Drain destinations
    #[serde(default)]
    pub drains: Vec<Drain>,
}

/// A validated drain: parsed URL plus the labels writers need.
#[derive(Debug, Clone)]
pub struct DrainSpec {
    /// Parsed destination
    pub url: Url,

    /// The URL as the provider sent it; pool key and metrics label
    pub raw_url: String,

    /// Scope
    pub scope: DrainScope,

    /// Output format
    pub format: SyslogFormat,

    /// Hostname label from the binding that introduced this drain
    pub hostname: String,
}

impl DrainSpec {
    /// Host portion of the URL. Validation guarantees presence.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Port, defaulting per scheme (514 for syslog, 6514 for
    /// syslog-tls, 443 for https).
    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or(match self.url.scheme() {
            "syslog" => 514,
            "syslog-tls" => 6514,
            _ => 443,
        })
    }
}

/// The published mapping from tenant to writers, swapped atomically on
/// each successful fetch.
#[derive(Debug, Default)]
pub struct BindingSet {
    /// APP-scope drains per tenant
    app_drains: HashMap<String, Vec<Arc<DrainSpec>>>,

    /// AGGREGATE-scope drains; receive every envelope
    aggregate_drains: Vec<Arc<DrainSpec>>,
}

impl BindingSet {
    /// Build the set from validated bindings, enforcing the per-tenant
    /// drain cap deterministically (drains sorted by URL, first N kept).
    ///
    /// Returns the set and the number of drains discarded by the cap.
    pub fn build(bindings: &[Binding], max_drains_per_app: usize) -> (Self, u64) {
        let mut set = BindingSet::default();
        let mut discarded = 0u64;
        let mut seen_urls: HashMap<String, Arc<DrainSpec>> = HashMap::new();

        for binding in bindings {
            let mut drains: Vec<&Drain> = binding.drains.iter().collect();
            drains.sort_by(|a, b| a.url.cmp(&b.url));
            if drains.len() > max_drains_per_app {
                discarded += (drains.len() - max_drains_per_app) as u64;
                drains.truncate(max_drains_per_app);
            }

            for drain in drains {
                let Ok(url) = Url::parse(&drain.url) else {
                    // Validation upstream already rejected these; a
                    // malformed URL slipping through is simply skipped.
                    continue;
                };
                let spec = seen_urls
                    .entry(drain.url.clone())
                    .or_insert_with(|| {
                        Arc::new(DrainSpec {
                            url,
                            raw_url: drain.url.clone(),
                            scope: drain.scope,
                            format: drain.format,
                            hostname: binding.hostname.clone(),
                        })
                    })
                    .clone();

                match spec.scope {
                    DrainScope::App => {
                        set.app_drains
                            .entry(binding.app_id.clone())
                            .or_default()
                            .push(spec);
                    }
                    DrainScope::Aggregate => {
                        if !set
                            .aggregate_drains
                            .iter()
                            .any(|d| d.raw_url == spec.raw_url)
                        {
                            set.aggregate_drains.push(spec);
                        }
                    }
                }
            }
        }

        (set, discarded)
    }

    /// APP-scope drains for a tenant.
    pub fn app_drains(&self, app_id: &str) -> &[Arc<DrainSpec>] {
        self.app_drains
            .get(app_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// AGGREGATE-scope drains.
    pub fn aggregate_drains(&self) -> &[Arc<DrainSpec>] {
        &self.aggregate_drains
    }

    /// Every distinct drain URL in the set.
    pub fn all_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .app_drains
            .values()
            .flatten()
            .chain(self.aggregate_drains.iter())
            .map(|spec| spec.raw_url.clone())
            .collect();
        urls.sort();
        urls.dedup();
        urls
    }

    /// Every distinct drain spec in the set.
    pub fn all_specs(&self) -> Vec<Arc<DrainSpec>> {
        let mut specs: Vec<Arc<DrainSpec>> = Vec::new();
        for spec in self
            .app_drains
            .values()
            .flatten()
            .chain(self.aggregate_drains.iter())
        {
            if !specs.iter().any(|s| s.raw_url == spec.raw_url) {
                specs.push(Arc::clone(spec));
            }
        }
        specs
    }

    /// True when no bindings are published.
    pub fn is_empty(&self) -> bool {
        self.app_drains.is_empty() && self.aggregate_drains.is_empty()
    }
}

#[cfg(test)]
#[path = "binding_test.rs"]
mod binding_test;
