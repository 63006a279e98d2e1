//! Wakeful wrapper - parking support on top of a diode
//!
//! Diode operations never suspend. Consumers that want to park instead of
//! polling pair the sender with a [`tokio::sync::Notify`]: `set` stores
//! the value (non-blocking, as always) and then nudges the notify. The
//! consumer awaits the notification and drains with `try_next` - the
//! suspension lives entirely outside the ring.

use std::sync::Arc;

use tokio::sync::Notify;

use crate::many_to_one::ManyToOneSender;
use crate::one_to_one::OneToOneSender;

/// A diode sender paired with a wakeup.
pub struct Wakeful<S> {
    inner: S,
    notify: Arc<Notify>,
}

impl<S> Wakeful<S> {
    /// Wrap a sender; the returned notify handle is awaited by the
    /// consumer.
    pub fn new(inner: S) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        (
            Self {
                inner,
                notify: Arc::clone(&notify),
            },
            notify,
        )
    }
}

impl<T: Send> Wakeful<OneToOneSender<T>> {
    /// Set a value and wake the consumer.
    pub fn set(&mut self, value: T) {
        self.inner.set(value);
        self.notify.notify_one();
    }
}

impl<T: Send> Wakeful<ManyToOneSender<T>> {
    /// Set a value and wake the consumer.
    pub fn set(&self, value: T) {
        self.inner.set(value);
        self.notify.notify_one();
    }
}

impl<T: Send> Clone for Wakeful<ManyToOneSender<T>> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            notify: Arc::clone(&self.notify),
        }
    }
}
