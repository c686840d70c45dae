//! Integration tests for the wsock-core frame codecs.
//!
//! These tests drive the public API the way a connection does: frames are
//! encoded back to back into one buffer, then decoded one at a time while the
//! buffer is fed in small slices.

use wsock_core::{
    apply_mask, decode_frame, decode_legacy_frame, encode_frame, encode_legacy_close,
    encode_legacy_text,
    protocol::{frame::close_code, frame::parse_close_payload, DEFAULT_MAX_PAYLOAD_LEN},
    Frame, LegacyFrame, Opcode, ProtocolError,
};

/// Encodes a frame and then decodes it, asserting that every byte is consumed.
fn roundtrip(frame: Frame) -> Frame {
    let bytes = encode_frame(&frame);
    let (decoded, consumed) =
        decode_frame(&bytes, DEFAULT_MAX_PAYLOAD_LEN).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

#[test]
fn test_roundtrip_across_length_encodings() {
    for len in [0usize, 1, 125, 126, 65_535, 65_536, 70_000] {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        let plain = Frame::binary(payload.clone());
        let masked = Frame::binary(payload).masked([0x37, 0xFA, 0x21, 0x3D]);

        assert_eq!(roundtrip(plain.clone()), plain, "unmasked len {len}");
        assert_eq!(roundtrip(masked.clone()), masked, "masked len {len}");
    }
}

#[test]
fn test_header_sizes_match_length_boundaries() {
    assert_eq!(encode_frame(&Frame::binary(vec![0; 125])).len(), 2 + 125);
    assert_eq!(encode_frame(&Frame::binary(vec![0; 126])).len(), 4 + 126);
    assert_eq!(encode_frame(&Frame::binary(vec![0; 65_535])).len(), 4 + 65_535);
    assert_eq!(encode_frame(&Frame::binary(vec![0; 65_536])).len(), 10 + 65_536);
}

#[test]
fn test_masking_is_an_involution() {
    let original = b"The quick brown fox".to_vec();
    let mut data = original.clone();

    apply_mask(&mut data, [0xDE, 0xAD, 0xBE, 0xEF]);
    assert_ne!(data, original);
    apply_mask(&mut data, [0xDE, 0xAD, 0xBE, 0xEF]);

    assert_eq!(data, original);
}

#[test]
fn test_streamed_decode_of_back_to_back_frames() {
    let frames = vec![
        Frame::text("hello").masked([1, 2, 3, 4]),
        Frame::ping("p"),
        Frame::binary(vec![7u8; 300]),
        Frame::close(close_code::NORMAL_CLOSURE, "bye"),
    ];
    let wire: Vec<u8> = frames.iter().flat_map(encode_frame).collect();

    // Feed 7 bytes at a time, retrying on TruncatedFrame like a socket reader.
    let mut buffer = Vec::new();
    let mut decoded = Vec::new();
    for chunk in wire.chunks(7) {
        buffer.extend_from_slice(chunk);
        loop {
            match decode_frame(&buffer, DEFAULT_MAX_PAYLOAD_LEN) {
                Ok((frame, consumed)) => {
                    buffer.drain(..consumed);
                    decoded.push(frame);
                }
                Err(e) if e.is_truncated() => break,
                Err(e) => panic!("unexpected decode error: {e}"),
            }
        }
    }

    assert!(buffer.is_empty());
    assert_eq!(decoded, frames);
}

#[test]
fn test_close_frame_payload_is_parsed() {
    let frame = roundtrip(Frame::close(close_code::GOING_AWAY, "restarting"));

    assert_eq!(frame.opcode, Opcode::Close);
    assert_eq!(
        parse_close_payload(&frame.payload).unwrap(),
        Some((close_code::GOING_AWAY, "restarting".to_string()))
    );
}

#[test]
fn test_oversized_frame_rejected_before_payload_arrives() {
    let header = encode_frame(&Frame::binary(vec![0; 4096]));

    // Only the 4-byte header: the limit check must not wait for the payload.
    let result = decode_frame(&header[..4], 1024);

    assert_eq!(
        result,
        Err(ProtocolError::PayloadTooLarge {
            declared: 4096,
            limit: 1024
        })
    );
}

#[test]
fn test_legacy_stream_of_texts_and_close() {
    let mut wire = encode_legacy_text("hi");
    wire.extend_from_slice(&encode_legacy_text("héllo wörld"));
    wire.extend_from_slice(&encode_legacy_close());

    let mut offset = 0;
    let mut frames = Vec::new();
    while offset < wire.len() {
        let (frame, consumed) = decode_legacy_frame(&wire[offset..], 1024).unwrap();
        offset += consumed;
        frames.push(frame);
    }

    assert_eq!(
        frames,
        vec![
            LegacyFrame::Text("hi".to_string()),
            LegacyFrame::Text("héllo wörld".to_string()),
            LegacyFrame::Close,
        ]
    );
}

#[test]
fn test_legacy_hi_frame_bytes() {
    assert_eq!(encode_legacy_text("hi"), vec![0x00, b'h', b'i', 0xFF]);
    assert_eq!(
        decode_legacy_frame(&[0x00, b'h', b'i', 0xFF], 16).unwrap(),
        (LegacyFrame::Text("hi".to_string()), 4)
    );
}

#[test]
fn test_legacy_partial_text_waits_for_terminator() {
    let result = decode_legacy_frame(&[0x00, b'h', b'i'], 16);
    assert!(result.unwrap_err().is_truncated());
}

#[test]
fn test_legacy_unknown_type_byte() {
    assert_eq!(
        decode_legacy_frame(&[0x05, b'x', 0xFF], 16),
        Err(ProtocolError::InvalidFrameType(0x05))
    );
    assert_eq!(
        decode_legacy_frame(&[0x80, 0x00], 16),
        Err(ProtocolError::InvalidFrameType(0x80))
    );
}
