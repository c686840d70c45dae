//! Codec for Hixie-76 ("v0") frames.
//!
//! Wire format:
//! ```text
//! text frame:            0x00 <UTF-8 bytes ...> 0xFF
//! length-prefixed frame: <type: high bit set> <base-128 length ...> <payload>
//! close signal:          0xFF 0x00
//! ```
//! The base-128 length is big-endian: each byte contributes its low 7 bits and
//! a set high bit means "another length byte follows".  The only
//! length-prefixed frame the draft defines is the zero-length close signal.

use crate::protocol::cursor::ByteCursor;
use crate::protocol::error::ProtocolError;

/// Frame type byte that starts a text frame.
pub const TEXT_FRAME_START: u8 = 0x00;

/// Sentinel that ends a text frame (and starts a length-prefixed one).
pub const TEXT_FRAME_END: u8 = 0xFF;

/// The two-byte close signal.
pub const LEGACY_CLOSE: [u8; 2] = [0xFF, 0x00];

/// A decoded v0 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyFrame {
    /// A complete UTF-8 text message.
    Text(String),
    /// The zero-length `0xFF` frame: the peer wants to close.
    Close,
}

/// Encodes `text` as a sentinel-delimited text frame.
///
/// Taking `&str` means the payload is already known to be valid UTF-8; callers
/// holding raw bytes must validate them first.
pub fn encode_legacy_text(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 2);
    buf.push(TEXT_FRAME_START);
    buf.extend_from_slice(text.as_bytes());
    buf.push(TEXT_FRAME_END);
    buf
}

/// Returns the close signal bytes.
pub fn encode_legacy_close() -> [u8; 2] {
    LEGACY_CLOSE
}

/// Decodes one v0 frame from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes it occupied.
///
/// # Errors
///
/// - [`ProtocolError::TruncatedFrame`] if the terminator (text frames) or the
///   declared length (length-prefixed frames) has not arrived yet.
/// - [`ProtocolError::InvalidFrameType`] for a type byte other than `0x00`
///   or `0xFF`.  This is reported from the first byte, without waiting for
///   the rest of the frame.
/// - [`ProtocolError::InvalidPayload`] if a text frame is not UTF-8.
/// - [`ProtocolError::UnsupportedFrame`] for a length-prefixed frame with a
///   nonzero length.
/// - [`ProtocolError::PayloadTooLarge`] once more than `max_payload_len`
///   bytes are pending for a single frame.
/// - [`ProtocolError::MalformedFrame`] if the base-128 length overflows.
pub fn decode_legacy_frame(
    bytes: &[u8],
    max_payload_len: usize,
) -> Result<(LegacyFrame, usize), ProtocolError> {
    decode_legacy_frame_from(bytes, max_payload_len, 0)
}

/// [`decode_legacy_frame`] for a buffer that is retried as it grows.
///
/// `scanned` is how many leading bytes of `bytes` an earlier call already
/// searched for the text terminator without finding it (the `available` of
/// its [`ProtocolError::TruncatedFrame`]).  The search resumes after them, so
/// a text frame arriving in many reads is scanned once in total.  Pass 0 when
/// nothing is known.
///
/// # Errors
///
/// As for [`decode_legacy_frame`].
pub fn decode_legacy_frame_from(
    bytes: &[u8],
    max_payload_len: usize,
    scanned: usize,
) -> Result<(LegacyFrame, usize), ProtocolError> {
    let mut cursor = ByteCursor::new(bytes);
    let frame_type = cursor.read_u8()?;

    if frame_type & 0x80 == 0 {
        if frame_type != TEXT_FRAME_START {
            return Err(ProtocolError::InvalidFrameType(frame_type));
        }
        decode_text(cursor, max_payload_len, scanned)
    } else {
        if frame_type != TEXT_FRAME_END {
            return Err(ProtocolError::InvalidFrameType(frame_type));
        }
        decode_length_prefixed(cursor, frame_type, max_payload_len)
    }
}

fn decode_text(
    mut cursor: ByteCursor<'_>,
    max_payload_len: usize,
    scanned: usize,
) -> Result<(LegacyFrame, usize), ProtocolError> {
    let skip = scanned.saturating_sub(cursor.position());
    let Some(text_len) = cursor.find_from(TEXT_FRAME_END, skip) else {
        let pending = cursor.remaining();
        if pending > max_payload_len {
            return Err(ProtocolError::PayloadTooLarge {
                declared: pending as u64,
                limit: max_payload_len,
            });
        }
        return Err(ProtocolError::TruncatedFrame {
            needed: cursor.position() + pending + 1,
            available: cursor.position() + pending,
        });
    };
    if text_len > max_payload_len {
        return Err(ProtocolError::PayloadTooLarge {
            declared: text_len as u64,
            limit: max_payload_len,
        });
    }

    let raw = cursor.take(text_len)?;
    let text = std::str::from_utf8(raw)
        .map_err(|_| ProtocolError::InvalidPayload)?
        .to_string();
    cursor.read_u8()?; // terminator
    Ok((LegacyFrame::Text(text), cursor.position()))
}

fn decode_length_prefixed(
    mut cursor: ByteCursor<'_>,
    frame_type: u8,
    max_payload_len: usize,
) -> Result<(LegacyFrame, usize), ProtocolError> {
    let mut length: u64 = 0;
    loop {
        let b = cursor.read_u8()?;
        length = length
            .checked_mul(128)
            .and_then(|l| l.checked_add(u64::from(b & 0x7F)))
            .ok_or_else(|| {
                ProtocolError::MalformedFrame("legacy frame length overflows".to_string())
            })?;
        if b & 0x80 == 0 {
            break;
        }
    }

    if length > max_payload_len as u64 {
        return Err(ProtocolError::PayloadTooLarge {
            declared: length,
            limit: max_payload_len,
        });
    }
    // Payload of a length-prefixed frame is read and dropped.
    cursor.take(length as usize)?;

    if length == 0 {
        Ok((LegacyFrame::Close, cursor.position()))
    } else {
        Err(ProtocolError::UnsupportedFrame { frame_type, length })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
