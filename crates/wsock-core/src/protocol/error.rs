//! Errors raised while decoding frames of either protocol era.

use thiserror::Error;

/// Errors that can occur during frame decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer ended before a complete frame was available.
    ///
    /// Stream readers treat this as "read more bytes and try again"; it only
    /// becomes fatal when the stream ends mid-frame.
    #[error("truncated frame: need at least {needed} bytes, got {available}")]
    TruncatedFrame { needed: usize, available: usize },

    /// The frame violates the wire format (reserved bits, unknown opcode,
    /// oversized control frame, invalid length encoding, ...).
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A legacy frame type byte other than `0x00` (text) or `0xFF`
    /// (length-prefixed) was received.
    #[error("invalid legacy frame type: 0x{0:02X}")]
    InvalidFrameType(u8),

    /// A text payload is not well-formed UTF-8.
    #[error("frame payload is not valid UTF-8")]
    InvalidPayload,

    /// A structurally valid frame this implementation does not handle.
    #[error("unsupported frame: type 0x{frame_type:02X} with length {length}")]
    UnsupportedFrame { frame_type: u8, length: u64 },

    /// The declared payload exceeds the configured limit.
    #[error("payload of {declared} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { declared: u64, limit: usize },
}

impl ProtocolError {
    /// Returns `true` when more input could turn this error into a success.
    pub fn is_truncated(&self) -> bool {
        matches!(self, ProtocolError::TruncatedFrame { .. })
    }
}
