//! Component counters and their snapshots
//!
//! All fields use atomics for lock-free updates; `snapshot()` reads are
//! relaxed and may be torn across fields, which is fine for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingress receiver counters
#[derive(Debug, Default)]
pub struct IngressMetrics {
    /// Currently open producer connections
    pub connections_active: AtomicU64,
    /// Total producer connections accepted
    pub connections_total: AtomicU64,
    /// Envelopes accepted and handed to the diode
    pub envelopes_received: AtomicU64,
    /// Bytes read off producer connections
    pub bytes_received: AtomicU64,
    /// Frames and envelopes dropped before the diode (oversized,
    /// malformed, or undecodable)
    pub malformed_dropped: AtomicU64,
    /// Envelopes destroyed by diode overflow (direction: ingress)
    pub overflow_dropped: AtomicU64,
}

impl IngressMetrics {
    pub const fn new() -> Self {
        Self {
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            envelopes_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            malformed_dropped: AtomicU64::new(0),
            overflow_dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_received(&self, bytes: u64) {
        self.envelopes_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_malformed(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_overflow(&self, count: u64) {
        self.overflow_dropped.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> IngressMetricsSnapshot {
        IngressMetricsSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            envelopes_received: self.envelopes_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of ingress counters
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct IngressMetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub envelopes_received: u64,
    pub bytes_received: u64,
    pub malformed_dropped: u64,
    pub overflow_dropped: u64,
}

/// Transponder / hub writer counters
#[derive(Debug, Default)]
pub struct EgressMetrics {
    /// Envelopes successfully written in batches toward the hub
    pub envelopes_written: AtomicU64,
    /// Batches handed to the writer
    pub batches_written: AtomicU64,
    /// Envelopes destroyed because a batch write failed (direction: egress)
    pub dropped: AtomicU64,
    /// Write attempts that returned an error
    pub write_errors: AtomicU64,
    /// Reconnections to the hub
    pub reconnects: AtomicU64,
}

impl EgressMetrics {
    pub const fn new() -> Self {
        Self {
            envelopes_written: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_batch_written(&self, envelopes: u64) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.envelopes_written.fetch_add(envelopes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch_dropped(&self, envelopes: u64) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(envelopes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> EgressMetricsSnapshot {
        EgressMetricsSnapshot {
            envelopes_written: self.envelopes_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of egress counters
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EgressMetricsSnapshot {
    pub envelopes_written: u64,
    pub batches_written: u64,
    pub dropped: u64,
    pub write_errors: u64,
    pub reconnects: u64,
}

/// Drain-manager-wide counters
#[derive(Debug, Default)]
pub struct DrainMetrics {
    /// Successful binding fetches
    pub binding_fetches: AtomicU64,
    /// Failed binding fetches (retried next cycle)
    pub fetch_failures: AtomicU64,
    /// Drains rejected at publication (bad URL, scheme, or blacklist)
    pub drains_rejected: AtomicU64,
    /// Drains discarded by the per-app cap
    pub drains_over_limit: AtomicU64,
    /// Writers currently alive
    pub active_writers: AtomicU64,
    /// Writers evicted by the idle timeout
    pub idle_evictions: AtomicU64,
}

impl DrainMetrics {
    pub const fn new() -> Self {
        Self {
            binding_fetches: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            drains_rejected: AtomicU64::new(0),
            drains_over_limit: AtomicU64::new(0),
            active_writers: AtomicU64::new(0),
            idle_evictions: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_fetch(&self) {
        self.binding_fetches.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.drains_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_over_limit(&self, count: u64) {
        self.drains_over_limit.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_writer_started(&self) {
        self.active_writers.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_writer_stopped(&self) {
        self.active_writers.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_idle_eviction(&self) {
        self.idle_evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> DrainMetricsSnapshot {
        DrainMetricsSnapshot {
            binding_fetches: self.binding_fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            drains_rejected: self.drains_rejected.load(Ordering::Relaxed),
            drains_over_limit: self.drains_over_limit.load(Ordering::Relaxed),
            active_writers: self.active_writers.load(Ordering::Relaxed),
            idle_evictions: self.idle_evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of drain manager counters
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DrainMetricsSnapshot {
    pub binding_fetches: u64,
    pub fetch_failures: u64,
    pub drains_rejected: u64,
    pub drains_over_limit: u64,
    pub active_writers: u64,
    pub idle_evictions: u64,
}

/// Per-drain counters, labelled by the drain URL at reporting time
#[derive(Debug, Default)]
pub struct DrainScopedMetrics {
    /// Envelopes enqueued to this writer
    pub enqueued: AtomicU64,
    /// Envelopes written to the destination
    pub written: AtomicU64,
    /// Envelopes destroyed by queue overflow
    pub queue_dropped: AtomicU64,
    /// Connection attempts that failed (transitions into backoff)
    pub connect_failures: AtomicU64,
    /// Envelopes dropped because they could not be formatted
    pub format_errors: AtomicU64,
}

impl DrainScopedMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            queue_dropped: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            format_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_queue_dropped(&self, count: u64) {
        self.queue_dropped.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_format_error(&self) {
        self.format_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn snapshot(&self) -> DrainScopedMetricsSnapshot {
        DrainScopedMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            queue_dropped: self.queue_dropped.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            format_errors: self.format_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of one drain's counters
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DrainScopedMetricsSnapshot {
    pub enqueued: u64,
    pub written: u64,
    pub queue_dropped: u64,
    pub connect_failures: u64,
    pub format_errors: u64,
}
