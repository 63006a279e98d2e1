//! Filtered binding fetcher tests

use super::*;
use crate::binding::{Drain, DrainScope, SyslogFormat};

struct StaticReader {
    bindings: Vec<Binding>,
    fail: bool,
}

#[async_trait]
impl BindingReader for StaticReader {
    async fn fetch_bindings(&self) -> Result<Vec<Binding>> {
        if self.fail {
            return Err(DrainError::InvalidUrl {
                url: "provider".into(),
                reason: "unavailable".into(),
            });
        }
        Ok(self.bindings.clone())
    }
}

fn drain(url: &str) -> Drain {
    Drain {
        url: url.into(),
        scope: DrainScope::App,
        credentials: None,
        format: SyslogFormat::Rfc5424,
    }
}

fn binding_with(urls: &[&str]) -> Binding {
    Binding {
        app_id: "app-id".into(),
        hostname: "we.dont.care".into(),
        drains: urls.iter().map(|u| drain(u)).collect(),
    }
}

fn fetcher_over(
    bindings: Vec<Binding>,
    blacklist: &[&str],
) -> (FilteredBindingFetcher, Arc<DrainMetrics>) {
    let metrics = Arc::new(DrainMetrics::new());
    let filter = IpFilter::new(blacklist.iter().map(|c| c.parse().unwrap()).collect());
    let fetcher = FilteredBindingFetcher::new(
        Box::new(StaticReader {
            bindings,
            fail: false,
        }),
        filter,
        Arc::clone(&metrics),
    );
    (fetcher, metrics)
}

#[tokio::test]
async fn test_propagates_reader_errors() {
    let metrics = Arc::new(DrainMetrics::new());
    let fetcher = FilteredBindingFetcher::new(
        Box::new(StaticReader {
            bindings: Vec::new(),
            fail: true,
        }),
        IpFilter::default(),
        metrics,
    );
    assert!(fetcher.fetch_bindings().await.is_err());
}

#[tokio::test]
async fn test_filters_invalid_urls() {
    let (fetcher, metrics) = fetcher_over(vec![binding_with(&["://"])], &[]);
    let bindings = fetcher.fetch_bindings().await.unwrap();
    assert!(bindings.is_empty());
    assert_eq!(metrics.snapshot().drains_rejected, 1);
}

#[tokio::test]
async fn test_filters_disallowed_schemes() {
    let (fetcher, metrics) = fetcher_over(vec![binding_with(&["foo://example.com"])], &[]);
    let bindings = fetcher.fetch_bindings().await.unwrap();
    assert!(bindings.is_empty());
    assert_eq!(metrics.snapshot().drains_rejected, 1);
}

#[tokio::test]
async fn test_filters_urls_without_host() {
    let (fetcher, metrics) = fetcher_over(vec![binding_with(&["syslog:///path-only"])], &[]);
    let bindings = fetcher.fetch_bindings().await.unwrap();
    assert!(bindings.is_empty());
    assert_eq!(metrics.snapshot().drains_rejected, 1);
}

#[tokio::test]
async fn test_filters_blacklisted_hosts() {
    let (fetcher, metrics) = fetcher_over(
        vec![binding_with(&["syslog://10.1.2.3:514"])],
        &["10.0.0.0/8"],
    );
    let bindings = fetcher.fetch_bindings().await.unwrap();
    assert!(bindings.is_empty());
    assert_eq!(metrics.snapshot().drains_rejected, 1);
}

#[tokio::test]
async fn test_keeps_valid_drains_and_drops_bad_siblings() {
    let (fetcher, metrics) = fetcher_over(
        vec![binding_with(&[
            "syslog://198.51.100.7:514",
            "foo://bad.example.com",
        ])],
        &["10.0.0.0/8"],
    );

    let bindings = fetcher.fetch_bindings().await.unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].drains.len(), 1);
    assert_eq!(bindings[0].drains[0].url, "syslog://198.51.100.7:514");
    assert_eq!(metrics.snapshot().drains_rejected, 1);
}

#[tokio::test]
async fn test_all_schemes_accepted() {
    let (fetcher, _) = fetcher_over(
        vec![binding_with(&[
            "syslog://198.51.100.7:514",
            "syslog-tls://198.51.100.7:6514",
            "https://198.51.100.7/ingest",
        ])],
        &[],
    );

    let bindings = fetcher.fetch_bindings().await.unwrap();
    assert_eq!(bindings[0].drains.len(), 3);
}
