//! Carrier - Metrics
//!
//! Lock-free counters for every component, snapshot types for reporting,
//! and the periodic reporter task.
//!
//! # Design
//!
//! - Counter structs use atomics internally; recording is a relaxed
//!   `fetch_add`, safe from any task
//! - Components hold an `Arc` to their counters and hand clones to the
//!   registry; snapshots are plain `Copy` structs
//! - The registry is created once at startup and passed by reference to
//!   every component; it is not a global
//! - Loss is always visible here: ingress, egress, and per-drain drops
//!   each have a dedicated counter

mod counters;
mod registry;
mod reporter;

pub use counters::{
    DrainMetrics, DrainMetricsSnapshot, DrainScopedMetrics, DrainScopedMetricsSnapshot,
    EgressMetrics, EgressMetricsSnapshot, IngressMetrics, IngressMetricsSnapshot,
};
pub use registry::MetricsRegistry;
pub use reporter::{MetricsReporter, DEFAULT_REPORT_INTERVAL};
