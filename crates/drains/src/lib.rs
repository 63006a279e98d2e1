//! Carrier - Drains
//!
//! Per-tenant syslog drain management: a binding fetcher polls the
//! binding provider, valid drains are published atomically, and one
//! writer per drain URL delivers matching envelopes with reconnect
//! backoff and idle eviction.
//!
//! # Architecture
//!
//! ```text
//!                    [Binding provider]
//!                          | poll
//!                   BindingFetcher ----> FilteredBindingFetcher
//!                          |  validated set        (URL + blacklist)
//!                          v
//!  [tap] --> Router --> published Arc<BindingSet>
//!               |
//!               +--> WriterPool --> DrainWriter (syslog://)
//!                          |------> DrainWriter (syslog-tls://)
//!                          +------> DrainWriter (https://)
//! ```
//!
//! # Guarantees
//!
//! - The router never blocks: writer queues are drop-oldest diodes and
//!   every drop is counted per drain
//! - Publication is an atomic snapshot swap; the router never sees a
//!   partial binding set
//! - Writers back off exponentially with jitter and never fail the
//!   process; only transport errors are retried

#[cfg(test)]
mod test_support;

mod backoff;
mod binding;
mod error;
mod fetcher;
mod ip_filter;
mod manager;
mod router;
mod syslog;
mod transport;
mod writer;

pub use backoff::Backoff;
pub use binding::{Binding, BindingSet, Drain, DrainScope, DrainSpec, SyslogFormat};
pub use error::{DrainError, Result};
pub use fetcher::{BindingReader, FilteredBindingFetcher, HttpBindingFetcher};
pub use ip_filter::IpFilter;
pub use manager::{DrainManager, DrainManagerConfig};
pub use router::DrainRouter;
