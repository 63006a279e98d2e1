//! Single-producer, single-consumer diode
//!
//! Used for per-drain-writer inbound queues: the drain router is the only
//! writer, the writer task the only reader.

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

/// Producer handle; deliberately not `Clone`.
pub struct OneToOneSender<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer handle.
pub struct OneToOneReceiver<T> {
    shared: Arc<Shared<T>>,
    read: u64,
}

/// Create a single-producer/single-consumer diode.
pub fn one_to_one<T: Send>(
    capacity: usize,
    alerter: DropAlerter,
) -> (OneToOneSender<T>, OneToOneReceiver<T>) {
    let capacity = ring_capacity(capacity);
    let shared = Arc::new(Shared {
        cells: make_cells(capacity),
        write: CachePadded::new(AtomicU64::new(0)),
        mask: capacity as u64 - 1,
        capacity: capacity as u64,
        alerter,
    });
    (
        OneToOneSender {
            shared: Arc::clone(&shared),
        },
        OneToOneReceiver { shared, read: 0 },
    )
}

impl<T: Send> OneToOneSender<T> {
    /// Store a value; never blocks. Overflow destroys the oldest unread
    /// value and reports it.
    pub fn set(&mut self, value: T) {
        let shared = &self.shared;
        let pos = shared.write.load(Ordering::Relaxed);
        let cell = &shared.cells[(pos & shared.mask) as usize];
        let outcome = cell.publish(pos, value);
        shared.write.store(pos + 1, Ordering::Release);
        match outcome {
            Publish::Stored => {}
            Publish::Overwrote | Publish::SelfDropped => (shared.alerter)(1),
        }
    }
}

impl<T: Send> OneToOneReceiver<T> {
    /// Return the next value in write order, or `None`. Never blocks.
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
                self.read = write.saturating_sub(shared.capacity).max(self.read + 1);
                continue;
            }
            if pos < self.read {
                return None;
            }

            match state {
                FULL => {
                    if let Some(value) = cell.take(self.read, shared.capacity) {
                        self.read += 1;
                        return Some(value);
                    }
                }
                EMPTY | WRITING | READING => return None,
                _ => unreachable!("two-bit state tag"),
            }
        }
    }

    /// Number of values set so far, for draining decisions at shutdown.
    pub fn values_set(&self) -> u64 {
        self.shared.write.load(Ordering::Acquire)
    }

    /// Whether everything set so far has been read or destroyed.
    pub fn is_drained(&self) -> bool {
        self.read >= self.values_set()
    }
}

#[cfg(test)]
#[path = "one_to_one_test.rs"]
mod one_to_one_test;
