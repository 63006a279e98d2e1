//! Syslog rendering tests

use carrier_protocol::{Envelope, LogType};
use url::Url;

use super::*;
use crate::binding::{DrainScope, DrainSpec, SyslogFormat};

// 2023-11-14T22:13:20Z
const TS_NANOS: i64 = 1_700_000_000_000_000_000;

fn spec(format: SyslogFormat) -> DrainSpec {
    DrainSpec {
        url: Url::parse("syslog://h1:514").unwrap(),
        raw_url: "syslog://h1:514".into(),
        scope: DrainScope::App,
        format,
        hostname: "org.space.app".into(),
    }
}

fn log_envelope(text: &[u8], log_type: LogType) -> Envelope {
    let mut envelope = Envelope::log("app-id", text.to_vec(), log_type);
    envelope.timestamp = TS_NANOS;
    envelope.instance_id = "3".into();
    envelope
}

#[test]
fn test_rfc5424_out_line() {
    let message = format_message(&spec(SyslogFormat::Rfc5424), &log_envelope(b"hello", LogType::Out))
        .unwrap();

    assert_eq!(
        String::from_utf8(message).unwrap(),
        "<14>1 2023-11-14T22:13:20Z org.space.app app-id 3 - \
         [tags@47450 app_id=\"app-id\" source_type=\"APP\" instance_id=\"3\"] hello"
    );
}

#[test]
fn test_rfc5424_err_severity() {
    let message = format_message(&spec(SyslogFormat::Rfc5424), &log_envelope(b"boom", LogType::Err))
        .unwrap();
    assert!(String::from_utf8(message).unwrap().starts_with("<11>1 "));
}

#[test]
fn test_rfc5424_source_type_tag() {
    let mut envelope = log_envelope(b"x", LogType::Out);
    envelope.tags.insert("source_type".into(), "RTR".into());

    let message =
        format_message(&spec(SyslogFormat::Rfc5424), &envelope).unwrap();
    assert!(String::from_utf8(message)
        .unwrap()
        .contains("source_type=\"RTR\""));
}

#[test]
fn test_newlines_stay_in_one_frame() {
    let message = format_message(
        &spec(SyslogFormat::Rfc5424),
        &log_envelope(b"line one\nline two\r\nline three", LogType::Out),
    )
    .unwrap();

    let text = String::from_utf8(message).unwrap();
    assert!(text.ends_with("line one\\nline two\\nline three"));
    assert!(!text.contains('\n'));
}

#[test]
fn test_sd_values_escaped() {
    let mut envelope = log_envelope(b"x", LogType::Out);
    envelope.source_id = "app\"with]chars\\".into();

    let message = format_message(&spec(SyslogFormat::Rfc5424), &envelope).unwrap();
    assert!(String::from_utf8(message)
        .unwrap()
        .contains("app_id=\"app\\\"with\\]chars\\\\\""));
}

#[test]
fn test_rfc3164_line() {
    let message = format_message(&spec(SyslogFormat::Rfc3164), &log_envelope(b"legacy", LogType::Out))
        .unwrap();

    assert_eq!(
        String::from_utf8(message).unwrap(),
        "<14>Nov 14 22:13:20 org.space.app app-id: legacy"
    );
}

#[test]
fn test_non_log_envelope_is_format_error() {
    let envelope = Envelope::counter("app", "c", 1);
    let err = format_message(&spec(SyslogFormat::Rfc5424), &envelope).unwrap_err();
    assert!(matches!(err, crate::error::DrainError::Format(_)));
}

#[test]
fn test_empty_fields_render_nil() {
    let mut envelope = Envelope::log("", b"x".to_vec(), LogType::Out);
    envelope.timestamp = TS_NANOS;
    let mut spec = spec(SyslogFormat::Rfc5424);
    spec.hostname = String::new();

    let text = String::from_utf8(format_message(&spec, &envelope).unwrap()).unwrap();
    assert!(text.starts_with("<14>1 2023-11-14T22:13:20Z - - - - "));
}

#[test]
fn test_octet_framing() {
    assert_eq!(octet_frame(b"hello"), b"5 hello");
    assert_eq!(octet_frame(b""), b"0 ");

    let message = b"<14>1 2023-11-14T22:13:20Z h a 1 - - hi";
    let framed = octet_frame(message);
    let expected = format!("{} ", message.len());
    assert!(framed.starts_with(expected.as_bytes()));
}
