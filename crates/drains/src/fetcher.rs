//! Binding fetchers
//!
//! `HttpBindingFetcher` pulls the full binding set from the provider
//! over mutual TLS. `FilteredBindingFetcher` wraps any reader and drops
//! drains that fail URL validation or resolve into the blacklist,
//! counting and logging each rejection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carrier_metrics::DrainMetrics;

use crate::binding::Binding;
use crate::error::{DrainError, Result};
use crate::ip_filter::IpFilter;

/// Schemes a drain URL may carry.
const ALLOWED_SCHEMES: [&str; 3] = ["syslog", "syslog-tls", "https"];

/// Source of the raw binding set.
#[async_trait]
pub trait BindingReader: Send + Sync {
    /// Fetch the complete current binding set.
    async fn fetch_bindings(&self) -> Result<Vec<Binding>>;
}

/// HTTPS binding fetcher with client-certificate auth.
pub struct HttpBindingFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpBindingFetcher {
    /// Build the fetcher.
    ///
    /// `client_cert_pem` and `client_key_pem` enable mutual TLS when
    /// both are non-empty paths; `ca_file` pins the provider's CA.
    pub fn new(
        url: impl Into<String>,
        client_cert_file: &str,
        client_key_file: &str,
        ca_file: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .connect_timeout(timeout);

        if !client_cert_file.is_empty() && !client_key_file.is_empty() {
            let mut pem = std::fs::read(client_cert_file).map_err(|e| {
                DrainError::ClientTls(format!("failed to read '{client_cert_file}': {e}"))
            })?;
            let key = std::fs::read(client_key_file).map_err(|e| {
                DrainError::ClientTls(format!("failed to read '{client_key_file}': {e}"))
            })?;
            pem.extend_from_slice(&key);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| DrainError::ClientTls(format!("unusable client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        if !ca_file.is_empty() {
            let pem = std::fs::read(ca_file)
                .map_err(|e| DrainError::ClientTls(format!("failed to read '{ca_file}': {e}")))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| DrainError::ClientTls(format!("unusable CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| DrainError::ClientTls(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build a fetcher for tests against a plain HTTP endpoint.
    pub fn insecure(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl BindingReader for HttpBindingFetcher {
    async fn fetch_bindings(&self) -> Result<Vec<Binding>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Validating wrapper: keeps only drains whose URL parses, whose scheme
/// is allowed, and whose host stays out of the blacklist.
pub struct FilteredBindingFetcher {
    inner: Box<dyn BindingReader>,
    filter: IpFilter,
    metrics: Arc<DrainMetrics>,
}

impl FilteredBindingFetcher {
    pub fn new(inner: Box<dyn BindingReader>, filter: IpFilter, metrics: Arc<DrainMetrics>) -> Self {
        Self {
            inner,
            filter,
            metrics,
        }
    }

    /// Validate one drain URL.
    async fn check_drain(&self, raw: &str) -> Result<()> {
        let url = url::Url::parse(raw).map_err(|e| DrainError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(DrainError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("scheme '{}' is not allowed", url.scheme()),
            });
        }

        let host = url.host_str().unwrap_or_default();
        if host.is_empty() {
            return Err(DrainError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".into(),
            });
        }

        self.filter.check_host(host).await?;
        Ok(())
    }
}

#[async_trait]
impl BindingReader for FilteredBindingFetcher {
    async fn fetch_bindings(&self) -> Result<Vec<Binding>> {
        let bindings = self.inner.fetch_bindings().await?;

        let mut filtered = Vec::with_capacity(bindings.len());
        for mut binding in bindings {
            let mut kept = Vec::with_capacity(binding.drains.len());
            for drain in binding.drains {
                match self.check_drain(&drain.url).await {
                    Ok(()) => kept.push(drain),
                    Err(e) => {
                        self.metrics.record_rejected();
                        tracing::warn!(
                            app_id = %binding.app_id,
                            url = %drain.url,
                            error = %e,
                            "rejected drain"
                        );
                    }
                }
            }
            binding.drains = kept;
            if !binding.drains.is_empty() {
                filtered.push(binding);
            }
        }

        Ok(filtered)
    }
}

#[cfg(test)]
#[path = "fetcher_test.rs"]
mod fetcher_test;
