//! Counter aggregator - delta to running-total accumulation
//!
//! Keeps one running total per counter key (source, name, sorted tags).
//! A counter that arrives with only a delta has the accumulated total
//! written back onto it; a counter that arrives with an explicit total
//! replaces the running value, and subsequent deltas resume from there.
//!
//! The map sits behind a single mutex; the critical section is lookup,
//! add, and insert. Entries untouched for the TTL are swept
//! opportunistically on write.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use carrier_protocol::{CounterKey, Envelope};
use parking_lot::Mutex;

use crate::processor::EnvelopeProcessor;

struct Entry {
    total: u64,
    last_seen: Instant,
}

struct Inner {
    entries: HashMap<CounterKey, Entry>,
    last_sweep: Instant,
}

/// Shared counter aggregator; safe to call from the ingress and drain
/// paths concurrently.
pub struct CounterAggregator {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl CounterAggregator {
    /// Create an aggregator whose idle entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            ttl,
        }
    }

    /// Number of live counter entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EnvelopeProcessor for CounterAggregator {
    fn process(&self, envelope: &mut Envelope) {
        let Some(key) = CounterKey::from_envelope(envelope) else {
            return;
        };
        let Some(counter) = envelope.as_counter_mut() else {
            return;
        };
        let now = Instant::now();

        let mut inner = self.inner.lock();

        if now.duration_since(inner.last_sweep) >= self.ttl {
            inner
                .entries
                .retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);
            inner.last_sweep = now;
        }

        let entry = inner.entries.entry(key).or_insert(Entry {
            total: 0,
            last_seen: now,
        });

        if counter.total != 0 {
            // Producer-supplied total replaces the running value.
            entry.total = counter.total;
        } else {
            entry.total = entry.total.wrapping_add(counter.delta);
            counter.total = entry.total;
        }
        entry.last_seen = now;
    }
}

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod aggregator_test;
