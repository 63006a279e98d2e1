//! Single-producer, many-consumer diode (fan-out tap)
//!
//! Every subscriber observes every value: consumers clone values out and
//! restore the cell, each advancing its own cursor. A consumer that falls
//! more than one ring behind the producer is lapped individually - its
//! cursor jumps to the earliest still-live value and its own alerter
//! receives the width of the jump. Fast consumers are unaffected by slow
//! ones; the ring always keeps the most recent `capacity` values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::alerter::DropAlerter;
use crate::cell::{decode, make_cells, Cell, EMPTY, FULL, READING, WRITING};
use crate::ring_capacity;

struct Shared<T> {
    cells: Box<[Cell<T>]>,
    write: CachePadded<AtomicU64>,
    mask: u64,
    capacity: u64,
}

/// Producer handle; deliberately not `Clone`.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

/// One consumer's view of the tap: an owned cursor plus its alerter.
pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
    read: u64,
    alerter: DropAlerter,
}

/// Create a single-producer/many-consumer diode.
pub fn one_to_many<T: Send + Clone>(capacity: usize) -> Publisher<T> {
    let capacity = ring_capacity(capacity);
    Publisher {
        shared: Arc::new(Shared {
            cells: make_cells(capacity),
            write: CachePadded::new(AtomicU64::new(0)),
            mask: capacity as u64 - 1,
            capacity: capacity as u64,
        }),
    }
}

impl<T: Send + Clone> Publisher<T> {
    /// Store a value; never blocks. Older values are overwritten freely -
    /// loss is observed and reported per subscriber.
    pub fn set(&mut self, value: T) {
        let shared = &self.shared;
        let pos = shared.write.load(Ordering::Relaxed);
        let cell = &shared.cells[(pos & shared.mask) as usize];
        let _ = cell.publish(pos, value);
        shared.write.store(pos + 1, Ordering::Release);
    }

    /// Register a consumer starting at the current write position.
    pub fn subscribe(&self, alerter: DropAlerter) -> Subscriber<T> {
        Subscriber {
            shared: Arc::clone(&self.shared),
            read: self.shared.write.load(Ordering::Acquire),
            alerter,
        }
    }
}

impl<T: Send + Clone> Subscriber<T> {
    /// Return a clone of the next value in write order, or `None`.
    /// Never blocks. On a lap, the cursor jumps to the earliest
    /// still-live value and the jump width goes to this subscriber's
    /// alerter.
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
                let jump = write.saturating_sub(shared.capacity).max(self.read + 1);
                (self.alerter)(jump - self.read);
                self.read = jump;
                continue;
            }
            if pos < self.read {
                return None;
            }

            match state {
                FULL => {
                    if let Some(value) = cell.peek_clone(self.read) {
                        self.read += 1;
                        return Some(value);
                    }
                    // Lost the claim to the producer or a sibling
                    // consumer mid-clone; retry.
                    std::hint::spin_loop();
                }
                READING => {
                    // A sibling consumer is cloning this cell; its
                    // critical section is one clone.
                    std::hint::spin_loop();
                }
                EMPTY | WRITING => return None,
                _ => unreachable!("two-bit state tag"),
            }
        }
    }
}

#[cfg(test)]
#[path = "one_to_many_test.rs"]
mod one_to_many_test;
