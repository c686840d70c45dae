//! Protocol module containing the v13 and v0 frame codecs.

pub mod cursor;
pub mod error;
pub mod frame;
pub mod legacy;

pub use error::ProtocolError;
pub use frame::{apply_mask, decode_frame, encode_frame, Frame, Opcode};
pub use legacy::{
    decode_legacy_frame, decode_legacy_frame_from, encode_legacy_close, encode_legacy_text,
    LegacyFrame,
};

/// Default upper bound on a single frame payload (64 MiB).
///
/// A v13 header can declare a 63-bit length; without a cap a single header
/// would make the decoder wait for (and allocate) an absurd amount of data.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;
