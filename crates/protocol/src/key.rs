//! Counter key - identity of an accumulating counter
//!
//! Two counter updates share a running total when their source, name, and
//! full tag set are equal. Tags are sorted at key construction so that map
//! iteration order cannot split a counter into separate totals.

use crate::envelope::{Counter, Envelope};

/// Identity of a counter series: (source, name, sorted tags).
///
/// Comparison is case-sensitive throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    source_id: String,
    name: String,
    tags: Vec<(String, String)>,
}

impl CounterKey {
    /// Build the key for a counter envelope.
    ///
    /// Returns `None` when the envelope does not carry a counter payload.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let counter = envelope.as_counter()?;
        Some(Self::new(&envelope.source_id, counter, envelope))
    }

    fn new(source_id: &str, counter: &Counter, envelope: &Envelope) -> Self {
        let mut tags: Vec<(String, String)> = envelope
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        tags.sort();

        Self {
            source_id: source_id.to_string(),
            name: counter.name.clone(),
            tags,
        }
    }

    /// The counter name portion of the key
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source portion of the key
    #[inline]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
