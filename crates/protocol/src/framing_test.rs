//! Frame codec tests

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::*;
use crate::envelope::{Envelope, LogType};
use crate::error::ProtocolError;

fn encode_frame(codec: &mut FrameCodec, frame: Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    codec.encode(frame, &mut buf).unwrap();
    buf
}

#[test]
fn test_round_trip() {
    let mut codec = FrameCodec::new();
    let env = Envelope::log("app", b"hi".to_vec(), LogType::Out);
    let frame = Frame::encode_message(Opcode::Send, &env);

    let mut buf = encode_frame(&mut codec, frame.clone());
    let decoded = codec.decode(&mut buf).unwrap().unwrap();

    assert_eq!(decoded.opcode, Opcode::Send);
    let out: Envelope = decoded.decode_payload().unwrap();
    assert_eq!(out, env);
    assert!(buf.is_empty());
}

#[test]
fn test_partial_frame_returns_none() {
    let mut codec = FrameCodec::new();
    let env = Envelope::log("app", b"hi".to_vec(), LogType::Out);
    let full = encode_frame(&mut codec, Frame::encode_message(Opcode::Stream, &env));

    // Feed all but the last byte
    let mut partial = BytesMut::from(&full[..full.len() - 1]);
    assert!(codec.decode(&mut partial).unwrap().is_none());

    // Complete the frame
    partial.extend_from_slice(&full[full.len() - 1..]);
    let decoded = codec.decode(&mut partial).unwrap().unwrap();
    assert_eq!(decoded.opcode, Opcode::Stream);
}

#[test]
fn test_oversize_frame_rejected_before_read() {
    let mut codec = FrameCodec::with_max_size(16);

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&1_000_000u32.to_be_bytes());

    match codec.decode(&mut buf) {
        Err(ProtocolError::FrameTooLarge { len, max }) => {
            assert_eq!(len, 1_000_000);
            assert_eq!(max, 16);
        }
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
}

#[test]
fn test_stream_resynchronizes_after_oversize_frame() {
    let mut codec = FrameCodec::with_max_size(64);

    let mut buf = BytesMut::new();
    // Oversized frame, fully buffered: declared 100 bytes against a
    // 64-byte maximum.
    buf.extend_from_slice(&100u32.to_be_bytes());
    buf.extend_from_slice(&[0xaa; 100]);
    // Followed immediately by a valid frame.
    let env = Envelope::counter("s", "c", 1);
    let mut encoder = FrameCodec::with_max_size(64);
    let valid = encode_frame(&mut encoder, Frame::encode_message(Opcode::Stream, &env));
    buf.extend_from_slice(&valid);

    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::FrameTooLarge { len: 100, max: 64 })
    ));

    // The oversized bytes were consumed; the next frame decodes.
    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded.opcode, Opcode::Stream);
    assert!(buf.is_empty());
}

#[test]
fn test_oversize_skip_spans_reads() {
    let mut codec = FrameCodec::with_max_size(16);

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&40u32.to_be_bytes());
    // Only part of the oversized body has arrived.
    buf.extend_from_slice(&[0xbb; 10]);

    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::FrameTooLarge { len: 40, .. })
    ));
    assert!(buf.is_empty());

    // The rest of the body trickles in and is silently discarded.
    buf.extend_from_slice(&[0xbb; 30]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    assert!(buf.is_empty());

    // The next frame decodes normally.
    let mut encoder = FrameCodec::with_max_size(16);
    buf.extend_from_slice(&encode_frame(&mut encoder, Frame::ack()));
    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded.opcode, Opcode::Ack);
}

#[test]
fn test_stream_continues_after_unknown_opcode() {
    let mut codec = FrameCodec::new();

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&1u32.to_be_bytes());
    buf.extend_from_slice(&[0x7f]);
    buf.extend_from_slice(&encode_frame(&mut codec, Frame::ack()));

    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::UnknownOpcode(0x7f))
    ));
    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded.opcode, Opcode::Ack);
}

#[test]
fn test_zero_length_frame_rejected() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&0u32.to_be_bytes());

    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::EmptyFrame)
    ));
}

#[test]
fn test_unknown_opcode_rejected() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&1u32.to_be_bytes());
    buf.extend_from_slice(&[0x7f]);

    assert!(matches!(
        codec.decode(&mut buf),
        Err(ProtocolError::UnknownOpcode(0x7f))
    ));
}

#[test]
fn test_ack_frame_is_empty() {
    let mut codec = FrameCodec::new();
    let mut buf = encode_frame(&mut codec, Frame::ack());

    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded.opcode, Opcode::Ack);
    assert!(decoded.payload.is_empty());
}

#[test]
fn test_back_to_back_frames() {
    let mut codec = FrameCodec::new();
    let a = Frame::encode_message(Opcode::Stream, &Envelope::counter("s", "c", 1));
    let b = Frame::ack();

    let mut buf = encode_frame(&mut codec, a);
    buf.extend_from_slice(&encode_frame(&mut codec, b));

    assert_eq!(codec.decode(&mut buf).unwrap().unwrap().opcode, Opcode::Stream);
    assert_eq!(codec.decode(&mut buf).unwrap().unwrap().opcode, Opcode::Ack);
    assert!(codec.decode(&mut buf).unwrap().is_none());
}
