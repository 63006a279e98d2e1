//! Many-producer, single-consumer diode
//!
//! The ingress side of the agent: every receiver connection sets into
//! this ring; the transponder is the only reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::alerter::DropAlerter;
use crate::cell::{decode, make_cells, Cell, Publish, EMPTY, FULL, READING, WRITING};
use crate::ring_capacity;

struct Shared<T> {
    cells: Box<[Cell<T>]>,
    write: CachePadded<AtomicU64>,
    mask: u64,
    capacity: u64,
    alerter: DropAlerter,
}

/// Producer handle. Cheap to clone; one per ingress connection.
pub struct ManyToOneSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ManyToOneSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer handle. Exactly one exists per ring.
pub struct ManyToOneReceiver<T> {
    shared: Arc<Shared<T>>,
    read: u64,
}

/// Create a many-producer/single-consumer diode.
///
/// `capacity` is rounded up to a power of two. The alerter receives the
/// count of values destroyed by overflow.
pub fn many_to_one<T: Send>(
    capacity: usize,
    alerter: DropAlerter,
) -> (ManyToOneSender<T>, ManyToOneReceiver<T>) {
    let capacity = ring_capacity(capacity);
    let shared = Arc::new(Shared {
        cells: make_cells(capacity),
        write: CachePadded::new(AtomicU64::new(0)),
        mask: capacity as u64 - 1,
        capacity: capacity as u64,
        alerter,
    });
    (
        ManyToOneSender {
            shared: Arc::clone(&shared),
        },
        ManyToOneReceiver { shared, read: 0 },
    )
}

impl<T: Send> ManyToOneSender<T> {
    /// Store a value. Never blocks, never fails; under overflow the
    /// oldest unread value is destroyed and reported to the alerter.
    pub fn set(&self, value: T) {
        let shared = &self.shared;
        let pos = shared.write.fetch_add(1, Ordering::Relaxed);
        let cell = &shared.cells[(pos & shared.mask) as usize];
        match cell.publish(pos, value) {
            Publish::Stored => {}
            Publish::Overwrote | Publish::SelfDropped => (shared.alerter)(1),
        }
    }
}

impl<T: Send> ManyToOneReceiver<T> {
    /// Return the next value in write order, or `None` when nothing is
    /// ready. Never blocks. When the writer has lapped this cursor the
    /// cursor jumps forward to the earliest still-live value; the skipped
    /// values were already reported by the writer when they were
    /// destroyed.
    pub fn try_next(&mut self) -> Option<T> {
        let shared = &self.shared;
        loop {
            let write = shared.write.load(Ordering::Acquire);
            if self.read >= write {
                return None;
            }

            let cell = &shared.cells[(self.read & shared.mask) as usize];
            let seq = cell.seq.load(Ordering::Acquire);
            let (pos, state) = decode(seq);

            if pos > self.read {
                // Lapped: advance to the earliest value that can still be
                // alive, then retry.
                let jump = write.saturating_sub(shared.capacity).max(self.read + 1);
                self.read = jump;
                continue;
            }
            if pos < self.read {
                // A producer owning an earlier lap stalled before
                // completing; nothing deliverable yet.
                return None;
            }

            match state {
                FULL => {
                    if let Some(value) = cell.take(self.read, shared.capacity) {
                        self.read += 1;
                        return Some(value);
                    }
                    // Claim race lost to a lapping producer; retry.
                }
                // EMPTY / WRITING: the value for this position is not
                // readable yet. READING cannot occur: we are the only
                // consumer.
                EMPTY | WRITING | READING => return None,
                _ => unreachable!("two-bit state tag"),
            }
        }
    }

    /// Capacity of the ring after power-of-two rounding.
    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }
}

#[cfg(test)]
#[path = "many_to_one_test.rs"]
mod many_to_one_test;
