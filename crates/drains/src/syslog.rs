//! Syslog message rendering
//!
//! Log envelopes render to RFC 5424 (default) or RFC 3164 (legacy)
//! messages. TCP and TLS drains add octet-counted framing; HTTPS drains
//! send the bare message as the request body.
//!
//! Severity mapping: ERR logs carry severity 11 (user.err), OUT logs
//! carry 14 (user.info). Embedded newlines stay inside one frame as a
//! literal `\n`.

use carrier_protocol::{Envelope, LogType};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::binding::{DrainSpec, SyslogFormat};
use crate::error::DrainError;

/// Structured-data element id carrying envelope identity.
const SD_ID: &str = "tags@47450";

/// NILVALUE per RFC 5424.
const NIL: &str = "-";

/// Render one envelope for a drain. Only log envelopes have a syslog
/// rendering; anything else is a format error counted by the caller.
pub(crate) fn format_message(spec: &DrainSpec, envelope: &Envelope) -> Result<Vec<u8>, DrainError> {
    let log = envelope
        .as_log()
        .ok_or_else(|| DrainError::Format("only log envelopes render to syslog".into()))?;

    let priority = match log.log_type() {
        LogType::Err => 11,
        LogType::Out => 14,
    };

    let timestamp = OffsetDateTime::from_unix_timestamp_nanos(envelope.timestamp as i128)
        .map_err(|e| DrainError::Format(format!("timestamp out of range: {e}")))?;

    match spec.format {
        SyslogFormat::Rfc5424 => format_rfc5424(spec, envelope, priority, timestamp, &log.payload),
        SyslogFormat::Rfc3164 => format_rfc3164(spec, envelope, priority, timestamp, &log.payload),
    }
}

/// Wrap a rendered message in octet-counted framing for stream drains.
pub(crate) fn octet_frame(message: &[u8]) -> Vec<u8> {
    let mut framed = message.len().to_string().into_bytes();
    framed.push(b' ');
    framed.extend_from_slice(message);
    framed
}

fn format_rfc5424(
    spec: &DrainSpec,
    envelope: &Envelope,
    priority: u8,
    timestamp: OffsetDateTime,
    payload: &[u8],
) -> Result<Vec<u8>, DrainError> {
    let ts = timestamp
        .format(&Rfc3339)
        .map_err(|e| DrainError::Format(e.to_string()))?;

    let hostname = non_empty_or_nil(&spec.hostname);
    let app_name = non_empty_or_nil(&envelope.source_id);
    let proc_id = non_empty_or_nil(&envelope.instance_id);

    let source_type = envelope
        .tags
        .get("source_type")
        .map(String::as_str)
        .unwrap_or("APP");

    let mut message = format!(
        "<{priority}>1 {ts} {hostname} {app_name} {proc_id} {NIL} [{SD_ID} app_id=\"{}\" source_type=\"{}\" instance_id=\"{}\"] ",
        sd_escape(&envelope.source_id),
        sd_escape(source_type),
        sd_escape(&envelope.instance_id),
    )
    .into_bytes();
    append_payload(&mut message, payload);
    Ok(message)
}

fn format_rfc3164(
    spec: &DrainSpec,
    envelope: &Envelope,
    priority: u8,
    timestamp: OffsetDateTime,
    payload: &[u8],
) -> Result<Vec<u8>, DrainError> {
    // "Nov 14 22:13:20" with a space-padded day.
    let format = format_description!(
        "[month repr:short] [day padding:space] [hour]:[minute]:[second]"
    );
    let ts = timestamp
        .format(&format)
        .map_err(|e| DrainError::Format(e.to_string()))?;

    let hostname = non_empty_or_nil(&spec.hostname);
    let tag = non_empty_or_nil(&envelope.source_id);

    let mut message = format!("<{priority}>{ts} {hostname} {tag}: ").into_bytes();
    append_payload(&mut message, payload);
    Ok(message)
}

/// Append payload bytes, turning embedded newlines into a literal `\n`
/// so one log line stays one frame.
fn append_payload(message: &mut Vec<u8>, payload: &[u8]) {
    for &byte in payload {
        match byte {
            b'\n' => message.extend_from_slice(b"\\n"),
            b'\r' => {}
            other => message.push(other),
        }
    }
}

fn non_empty_or_nil(value: &str) -> &str {
    if value.is_empty() {
        NIL
    } else {
        value
    }
}

/// Escape an SD-PARAM value per RFC 5424 (backslash, quote, bracket).
fn sd_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '"' | ']' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
#[path = "syslog_test.rs"]
mod syslog_test;
