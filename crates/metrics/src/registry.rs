//! Metrics registry - the injected handle shared by every component
//!
//! Created once at startup and passed into each component as cloned
//! `Arc`s of the individual counter structs. Per-drain counters register
//! with the writer lifecycle and survive writer re-creation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::counters::{DrainMetrics, DrainScopedMetrics, EgressMetrics, IngressMetrics};

/// All counters for one agent process.
#[derive(Default)]
pub struct MetricsRegistry {
    ingress: Arc<IngressMetrics>,
    egress: Arc<EgressMetrics>,
    drains: Arc<DrainMetrics>,
    per_drain: Mutex<HashMap<String, Arc<DrainScopedMetrics>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingress counters handle
    pub fn ingress(&self) -> Arc<IngressMetrics> {
        Arc::clone(&self.ingress)
    }

    /// Egress counters handle
    pub fn egress(&self) -> Arc<EgressMetrics> {
        Arc::clone(&self.egress)
    }

    /// Drain-manager counters handle
    pub fn drains(&self) -> Arc<DrainMetrics> {
        Arc::clone(&self.drains)
    }

    /// Counters for one drain URL, created on first use.
    ///
    /// The same handle is returned for repeated registrations so a
    /// re-created writer continues its predecessor's counts.
    pub fn drain_scoped(&self, url: &str) -> Arc<DrainScopedMetrics> {
        let mut per_drain = self.per_drain.lock();
        Arc::clone(
            per_drain
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(DrainScopedMetrics::new())),
        )
    }

    /// Snapshot every per-drain counter, labelled by URL.
    pub fn per_drain_snapshots(&self) -> Vec<(String, crate::DrainScopedMetricsSnapshot)> {
        let per_drain = self.per_drain.lock();
        let mut snapshots: Vec<_> = per_drain
            .iter()
            .map(|(url, metrics)| (url.clone(), metrics.snapshot()))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }
}
