//! Drop alerter - how a diode reports loss
//!
//! The alerter is invoked from `set` and `try_next` paths, so it must be
//! cheap and must never block. Implementations are typically a counter
//! bump plus a rate-limited log line.

use std::sync::Arc;

/// Callback receiving the number of values lost in one event.
pub type DropAlerter = Arc<dyn Fn(u64) + Send + Sync>;

/// An alerter that ignores all drops.
pub fn noop_alerter() -> DropAlerter {
    Arc::new(|_| {})
}
