//! Ring cell - sequence-guarded slot shared by all diode flavors
//!
//! A cell's sequence word encodes `(position << 2) | state`. The position
//! is the ring-global index of the value the cell holds (or is reserved
//! for); the state tag is one of empty / writing / full / reading. The
//! sequence doubles as the ABA guard: a reader that loses a claim race
//! re-reads the word and sees the new position.
//!
//! Slot access discipline: the task that wins a compare-exchange into
//! `WRITING` or `READING` owns the slot exclusively until it stores the
//! follow-up state with `Release` ordering.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Cell state tags (low two bits of the sequence word)
pub(crate) const EMPTY: u64 = 0;
pub(crate) const WRITING: u64 = 1;
pub(crate) const FULL: u64 = 2;
pub(crate) const READING: u64 = 3;

#[inline]
pub(crate) const fn encode(pos: u64, state: u64) -> u64 {
    (pos << 2) | state
}

#[inline]
pub(crate) const fn decode(seq: u64) -> (u64, u64) {
    (seq >> 2, seq & 0b11)
}

/// One ring slot: an atomic sequence word guarding an inline value slot.
pub(crate) struct Cell<T> {
    pub(crate) seq: CachePadded<AtomicU64>,
    pub(crate) slot: UnsafeCell<Option<T>>,
}

// The sequence-word claim protocol serializes all slot access.
unsafe impl<T: Send> Sync for Cell<T> {}

impl<T> Cell<T> {
    fn new(first_pos: u64) -> Self {
        Self {
            seq: CachePadded::new(AtomicU64::new(encode(first_pos, EMPTY))),
            slot: UnsafeCell::new(None),
        }
    }
}

/// Outcome of publishing a value into a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Publish {
    /// Value stored into an empty slot
    Stored,
    /// Value stored; an unread value was destroyed to make room
    Overwrote,
    /// A later producer already owns the cell; the new value was destroyed
    SelfDropped,
}

/// Allocate the cell array for a ring of `capacity` (a power of two).
pub(crate) fn make_cells<T>(capacity: usize) -> Box<[Cell<T>]> {
    (0..capacity as u64).map(Cell::new).collect()
}

impl<T> Cell<T> {
    /// Publish `value` as position `pos`. Never blocks on the consumer;
    /// spins only while another task is inside its single-move critical
    /// section.
    pub(crate) fn publish(&self, pos: u64, value: T) -> Publish {
        let mut value = Some(value);
        loop {
            let seq = self.seq.load(Ordering::Acquire);
            let (p, state) = decode(seq);

            if p > pos {
                // A producer for a later lap already took the cell over;
                // this value can no longer be delivered in order.
                return Publish::SelfDropped;
            }

            match state {
                EMPTY | FULL => {
                    if self
                        .seq
                        .compare_exchange(
                            seq,
                            encode(pos, WRITING),
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        // SAFETY: the CAS into WRITING grants exclusive
                        // slot access until the Release store below.
                        let old = unsafe {
                            (*self.slot.get()).replace(value.take().expect("value consumed once"))
                        };
                        self.seq.store(encode(pos, FULL), Ordering::Release);
                        return match (state, old) {
                            (FULL, Some(_)) => Publish::Overwrote,
                            _ => Publish::Stored,
                        };
                    }
                }
                // WRITING | READING: another task is mid-move; its
                // critical section is a single Option swap.
                _ => std::hint::spin_loop(),
            }
        }
    }

    /// Take the value for position `pos` out of the cell, handing the
    /// slot to the producer of `pos + capacity`. Returns `None` when a
    /// lapping producer won the claim race.
    pub(crate) fn take(&self, pos: u64, capacity: u64) -> Option<T> {
        let seq = encode(pos, FULL);
        if self
            .seq
            .compare_exchange(
                seq,
                encode(pos, READING),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return None;
        }
        // SAFETY: the CAS into READING grants exclusive slot access.
        let value = unsafe { (*self.slot.get()).take() };
        self.seq.store(encode(pos + capacity, EMPTY), Ordering::Release);
        value
    }
}

impl<T: Clone> Cell<T> {
    /// Clone the value for position `pos` out of the cell, restoring it
    /// for other consumers. Returns `None` when the claim race was lost.
    pub(crate) fn peek_clone(&self, pos: u64) -> Option<T> {
        let seq = encode(pos, FULL);
        if self
            .seq
            .compare_exchange(
                seq,
                encode(pos, READING),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return None;
        }
        // SAFETY: the CAS into READING grants exclusive slot access.
        let value = unsafe { (*self.slot.get()).clone() };
        self.seq.store(encode(pos, FULL), Ordering::Release);
        value
    }
}
