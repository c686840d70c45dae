//! Binary codec for RFC 6455 ("v13") WebSocket frames.
//!
//! Wire format:
//! ```text
//!  0               1               2               3
//! [FIN|RSV1-3|op:4][MASK|len:7   ][ext len: 0, 2 or 8 bytes  ]
//! [mask key: 0 or 4 bytes        ][payload: len bytes ...     ]
//! ```
//! All multi-byte integers are big-endian.  The 7-bit length field holds the
//! payload length directly when it is at most 125; the codes 126 and 127 mean
//! "the real length follows as a 16-bit / 64-bit integer".

use crate::protocol::cursor::ByteCursor;
use crate::protocol::error::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Largest payload that fits in the 7-bit length field.
pub const MAX_INLINE_LEN: usize = 125;

/// Largest payload a control frame (close, ping, pong) may carry.
pub const MAX_CONTROL_PAYLOAD_LEN: usize = 125;

const LEN_CODE_16: u8 = 126;
const LEN_CODE_64: u8 = 127;

/// Close status codes (RFC 6455 §7.4.1).
pub mod close_code {
    pub const NORMAL_CLOSURE: u16 = 1000;
    pub const GOING_AWAY: u16 = 1001;
    pub const PROTOCOL_ERROR: u16 = 1002;
    pub const UNSUPPORTED_DATA: u16 = 1003;
    pub const NO_STATUS_RECEIVED: u16 = 1005;
    pub const ABNORMAL_CLOSURE: u16 = 1006;
    pub const INVALID_FRAME_PAYLOAD: u16 = 1007;
    pub const POLICY_VIOLATION: u16 = 1008;
    pub const MESSAGE_TOO_BIG: u16 = 1009;
    pub const MANDATORY_EXTENSION: u16 = 1010;
    pub const INTERNAL_ERROR: u16 = 1011;
    pub const SERVICE_RESTART: u16 = 1012;
    pub const TRY_AGAIN_LATER: u16 = 1013;
    pub const TLS_HANDSHAKE: u16 = 1015;

    /// Whether `code` may appear in a close frame on the wire.
    ///
    /// 1004-1006 and 1015 are reserved for local reporting, 1016-2999 are
    /// unassigned and 0-999 and 5000 and above are never used.
    pub fn is_sendable(code: u16) -> bool {
        matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
    }
}

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// The 4-bit frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Control frames (close, ping, pong) have the high bit of the opcode set.
    pub fn is_control(self) -> bool {
        (self as u8) & 0x08 != 0
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            _ => Err(()),
        }
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One RFC 6455 frame.
///
/// `payload` always holds the *unmasked* bytes.  `mask` records the key the
/// frame was (or will be) masked with on the wire; it is `Some` exactly when
/// the MASK bit is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub mask: Option<[u8; 4]>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(fin: bool, opcode: Opcode, mask: Option<[u8; 4]>, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            mask,
            payload,
        }
    }

    /// A single, final, unmasked text frame.
    pub fn text(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(true, Opcode::Text, None, payload.into())
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(true, Opcode::Binary, None, payload.into())
    }

    pub fn ping(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(true, Opcode::Ping, None, payload.into())
    }

    pub fn pong(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(true, Opcode::Pong, None, payload.into())
    }

    /// A close frame carrying a status code and a UTF-8 reason.
    ///
    /// The reason is truncated (on a character boundary) so the payload never
    /// exceeds the 125-byte control frame limit.
    pub fn close(code: u16, reason: &str) -> Self {
        let mut reason_len = reason.len().min(MAX_CONTROL_PAYLOAD_LEN - 2);
        while !reason.is_char_boundary(reason_len) {
            reason_len -= 1;
        }
        let mut payload = Vec::with_capacity(2 + reason_len);
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(&reason.as_bytes()[..reason_len]);
        Self::new(true, Opcode::Close, None, payload)
    }

    /// A close frame with no status code.
    pub fn close_empty() -> Self {
        Self::new(true, Opcode::Close, None, Vec::new())
    }

    /// Returns the same frame, set to be masked with `key` when encoded.
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    /// Serializes this frame.  See [`encode_frame`].
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self)
    }
}

// ── Masking ───────────────────────────────────────────────────────────────────

/// XORs `payload` in place with the 4-byte `key`, cycling through the key.
///
/// Masking and unmasking are the same operation: applying the same key twice
/// restores the original bytes.  The codec applies it exactly once per
/// direction (on a copy when encoding, in place when decoding).
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encodes a [`Frame`] into its wire representation.
///
/// The length uses the smallest encoding that fits.  When `frame.mask` is set,
/// the payload is masked on the way out; `frame` itself is left untouched.
///
/// # Examples
///
/// ```rust
/// use wsock_core::protocol::frame::{decode_frame, encode_frame, Frame};
///
/// let frame = Frame::text("hi").masked([1, 2, 3, 4]);
/// let bytes = encode_frame(&frame);
/// let (decoded, consumed) = decode_frame(&bytes, 1024).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let len = frame.payload.len();
    let mut buf = Vec::with_capacity(header_len(len, frame.mask.is_some()) + len);

    let fin_bit = if frame.fin { 0x80 } else { 0x00 };
    buf.push(fin_bit | (frame.opcode as u8 & 0x0F));

    let mask_bit = if frame.mask.is_some() { 0x80 } else { 0x00 };
    if len <= MAX_INLINE_LEN {
        buf.push(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        buf.push(mask_bit | LEN_CODE_16);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        buf.push(mask_bit | LEN_CODE_64);
        buf.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match frame.mask {
        Some(key) => {
            buf.extend_from_slice(&key);
            let start = buf.len();
            buf.extend_from_slice(&frame.payload);
            apply_mask(&mut buf[start..], key);
        }
        None => buf.extend_from_slice(&frame.payload),
    }
    buf
}

fn header_len(payload_len: usize, masked: bool) -> usize {
    let ext = if payload_len <= MAX_INLINE_LEN {
        0
    } else if payload_len <= u16::MAX as usize {
        2
    } else {
        8
    };
    2 + ext + if masked { 4 } else { 0 }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Returns the frame (payload already unmasked) and the number of bytes it
/// occupied, so the caller can advance its read buffer.
///
/// # Errors
///
/// - [`ProtocolError::TruncatedFrame`] if `bytes` ends before the frame does.
///   Nothing is consumed; the caller should read more and retry.
/// - [`ProtocolError::MalformedFrame`] for reserved bits, unknown opcodes,
///   fragmented or oversized control frames, or a 64-bit length with the
///   most significant bit set.
/// - [`ProtocolError::PayloadTooLarge`] if the declared length exceeds
///   `max_payload_len`.  This is checked before waiting for the payload.
pub fn decode_frame(bytes: &[u8], max_payload_len: usize) -> Result<(Frame, usize), ProtocolError> {
    let mut cursor = ByteCursor::new(bytes);

    let control = cursor.read_u8()?;
    let fin = control & 0x80 != 0;
    if control & 0x70 != 0 {
        return Err(ProtocolError::MalformedFrame(format!(
            "reserved bits set without a negotiated extension: 0x{:02X}",
            control & 0x70
        )));
    }
    let opcode_bits = control & 0x0F;
    let opcode = Opcode::try_from(opcode_bits)
        .map_err(|_| ProtocolError::MalformedFrame(format!("unknown opcode: 0x{opcode_bits:X}")))?;

    let length_byte = cursor.read_u8()?;
    let masked = length_byte & 0x80 != 0;
    let payload_len = match length_byte & 0x7F {
        LEN_CODE_16 => u64::from(cursor.read_u16_be()?),
        LEN_CODE_64 => {
            let len = cursor.read_u64_be()?;
            if len >> 63 != 0 {
                return Err(ProtocolError::MalformedFrame(
                    "most significant bit of 64-bit length must be 0".to_string(),
                ));
            }
            len
        }
        inline => u64::from(inline),
    };

    if opcode.is_control() {
        if !fin {
            return Err(ProtocolError::MalformedFrame(format!(
                "fragmented control frame: {opcode:?}"
            )));
        }
        if payload_len > MAX_CONTROL_PAYLOAD_LEN as u64 {
            return Err(ProtocolError::MalformedFrame(format!(
                "control frame payload of {payload_len} bytes exceeds {MAX_CONTROL_PAYLOAD_LEN}"
            )));
        }
    }

    if payload_len > max_payload_len as u64 {
        return Err(ProtocolError::PayloadTooLarge {
            declared: payload_len,
            limit: max_payload_len,
        });
    }

    let mask = if masked {
        Some(cursor.read_array::<4>()?)
    } else {
        None
    };

    // `payload_len <= max_payload_len`, so the cast cannot truncate.
    let mut payload = cursor.take(payload_len as usize)?.to_vec();
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok((Frame::new(fin, opcode, mask, payload), cursor.position()))
}

/// Splits a close frame payload into its status code and reason.
///
/// Returns `None` for an empty payload (no status code sent).
///
/// # Errors
///
/// - [`ProtocolError::MalformedFrame`] for a 1-byte payload.
/// - [`ProtocolError::InvalidPayload`] if the reason is not UTF-8.
pub fn parse_close_payload(payload: &[u8]) -> Result<Option<(u16, String)>, ProtocolError> {
    if payload.is_empty() {
        return Ok(None);
    }
    let mut cursor = ByteCursor::new(payload);
    let code = cursor.read_u16_be().map_err(|_| {
        ProtocolError::MalformedFrame("close payload must be empty or at least 2 bytes".to_string())
    })?;
    let reason = std::str::from_utf8(cursor.take(cursor.remaining())?)
        .map_err(|_| ProtocolError::InvalidPayload)?
        .to_string();
    Ok(Some((code, reason)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
