//! Carrier - Diode
//!
//! Bounded lock-free ring buffers with drop-oldest overflow semantics.
//! A diode absorbs ingress bursts without ever blocking the writer: when
//! the ring is full, the oldest unread value is destroyed and the loss is
//! reported through a [`DropAlerter`].
//!
//! # Flavors
//!
//! - [`many_to_one`] - many producers, one consumer (ingress to the
//!   transponder)
//! - [`one_to_many`] - one producer, independently-cursored consumers
//!   (the tap feeding the drain manager)
//! - [`one_to_one`] - one producer, one consumer (per-drain-writer
//!   queues)
//!
//! # Contract
//!
//! `set` never blocks and never fails. `try_next` never blocks and
//! returns `None` when no value is ready. Capacity is rounded up to a
//! power of two so cursor-to-index mapping is a mask.
//!
//! # Accounting
//!
//! For the single-consumer flavors every value is either delivered by
//! `try_next` or reported exactly once to the alerter at the moment it is
//! destroyed, so `delivered + dropped == set` at quiescence. The
//! one-to-many flavor clones values out instead of taking them; there the
//! alerter is per-consumer and reports the width of each cursor jump.
//!
//! # Design
//!
//! Each cell carries an atomic sequence word encoding the position it
//! holds and a four-state tag (empty / writing / full / reading). All
//! slot access is claimed by a compare-exchange on that word; the winner
//! has exclusive access to the slot until it publishes the next state.
//! Cursor and sequence updates are plain atomics - no mutex anywhere on
//! the path. Contended claims retry with a spin hint; the critical
//! section on the other side is a single move.

mod alerter;
mod cell;
mod many_to_one;
mod one_to_many;
mod one_to_one;
mod wakeful;

pub use alerter::{noop_alerter, DropAlerter};
pub use many_to_one::{many_to_one, ManyToOneReceiver, ManyToOneSender};
pub use one_to_many::{one_to_many, Publisher, Subscriber};
pub use one_to_one::{one_to_one, OneToOneReceiver, OneToOneSender};
pub use wakeful::Wakeful;

/// Round a requested capacity up to a power of two, with a floor of 2.
pub(crate) fn ring_capacity(requested: usize) -> usize {
    requested.max(2).next_power_of_two()
}
