//! Envelope - the atomic telemetry record
//!
//! Field tags follow the existing envelope schema so that encoded bytes
//! interoperate with producers and collectors already speaking it. Tag 4
//! (deprecated tag values) is intentionally unassigned.

use std::collections::HashMap;

/// The unit of data moved through the pipeline.
///
/// Exactly one payload variant is present in a well-formed envelope;
/// `message == None` only occurs for envelopes decoded from malformed
/// input, and such envelopes are dropped at ingress.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    /// Source timestamp, nanoseconds since the epoch
    #[prost(int64, tag = "1")]
    pub timestamp: i64,

    /// Tenant / application identifier used for drain routing
    #[prost(string, tag = "2")]
    pub source_id: String,

    /// Instance identifier within the source
    #[prost(string, tag = "3")]
    pub instance_id: String,

    /// Free-form string tags
    #[prost(map = "string, string", tag = "9")]
    pub tags: HashMap<String, String>,

    /// Payload variant
    #[prost(oneof = "Message", tags = "5, 6, 7, 8, 10")]
    pub message: Option<Message>,
}

/// Payload variants
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Message {
    #[prost(message, tag = "5")]
    Log(Log),
    #[prost(message, tag = "6")]
    Counter(Counter),
    #[prost(message, tag = "7")]
    Gauge(Gauge),
    #[prost(message, tag = "8")]
    Timer(Timer),
    #[prost(message, tag = "10")]
    Event(Event),
}

/// Log line payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Log {
    /// Raw log bytes (UTF-8 on drain paths)
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,

    /// Stream the line was read from
    #[prost(enumeration = "LogType", tag = "2")]
    pub r#type: i32,
}

/// Log stream discriminator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogType {
    Out = 0,
    Err = 1,
}

/// Monotonic counter update
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Counter {
    #[prost(string, tag = "1")]
    pub name: String,

    /// Increment since the previous update
    #[prost(uint64, tag = "5")]
    pub delta: u64,

    /// Running total; zero means "let the aggregator accumulate"
    #[prost(uint64, tag = "6")]
    pub total: u64,
}

/// Point-in-time gauge values
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Gauge {
    #[prost(map = "string, message", tag = "1")]
    pub metrics: HashMap<String, GaugeValue>,
}

/// A single gauge measurement
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GaugeValue {
    #[prost(string, tag = "1")]
    pub unit: String,

    #[prost(double, tag = "2")]
    pub value: f64,
}

/// Duration measurement
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Timer {
    #[prost(string, tag = "1")]
    pub name: String,

    /// Start, nanoseconds since the epoch
    #[prost(int64, tag = "2")]
    pub start: i64,

    /// Stop, nanoseconds since the epoch
    #[prost(int64, tag = "3")]
    pub stop: i64,
}

/// Free-form event payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Event {
    #[prost(string, tag = "1")]
    pub title: String,

    #[prost(string, tag = "2")]
    pub body: String,
}

/// A batch of envelopes as carried on the wire
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnvelopeBatch {
    #[prost(message, repeated, tag = "1")]
    pub batch: Vec<Envelope>,
}

impl Envelope {
    /// Build a log envelope
    pub fn log(source_id: impl Into<String>, payload: impl Into<Vec<u8>>, log_type: LogType) -> Self {
        Self {
            source_id: source_id.into(),
            message: Some(Message::Log(Log {
                payload: payload.into(),
                r#type: log_type as i32,
            })),
            ..Default::default()
        }
    }

    /// Build a counter-delta envelope
    pub fn counter(source_id: impl Into<String>, name: impl Into<String>, delta: u64) -> Self {
        Self {
            source_id: source_id.into(),
            message: Some(Message::Counter(Counter {
                name: name.into(),
                delta,
                total: 0,
            })),
            ..Default::default()
        }
    }

    /// A well-formed envelope carries exactly one payload variant and a
    /// non-negative timestamp.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.message.is_some() && self.timestamp >= 0
    }

    /// Get the log payload if this is a log envelope
    #[inline]
    pub fn as_log(&self) -> Option<&Log> {
        match &self.message {
            Some(Message::Log(log)) => Some(log),
            _ => None,
        }
    }

    /// Get the counter payload if this is a counter envelope
    #[inline]
    pub fn as_counter(&self) -> Option<&Counter> {
        match &self.message {
            Some(Message::Counter(c)) => Some(c),
            _ => None,
        }
    }

    /// Mutable counter access for aggregator write-back
    #[inline]
    pub fn as_counter_mut(&mut self) -> Option<&mut Counter> {
        match &mut self.message {
            Some(Message::Counter(c)) => Some(c),
            _ => None,
        }
    }

    /// Set a tag only when the key is not already present
    pub fn tag_if_absent(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        if !self.tags.contains_key(key) {
            self.tags.insert(key.to_string(), value.to_string());
        }
    }
}

impl Log {
    /// Decoded stream discriminator, defaulting unknown values to OUT
    #[inline]
    pub fn log_type(&self) -> LogType {
        LogType::try_from(self.r#type).unwrap_or(LogType::Out)
    }
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod envelope_test;
