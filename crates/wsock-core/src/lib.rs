//! # wsock-core
//!
//! Shared library for wsock containing the WebSocket frame codecs and the
//! handshake primitives for both protocol eras.
//!
//! This crate is used by the `wsock` networking crate.  It has zero
//! dependencies on sockets or async runtimes: every function here works on
//! byte slices and strings, so it can be tested without a network.
//!
//! # Architecture overview (for beginners)
//!
//! WebSocket has two incompatible "eras" that this project speaks:
//!
//! - **Hixie-76 ("v0")** – an early draft.  The handshake proves the server
//!   understood the request by answering an MD5 challenge built from two
//!   obfuscated numeric keys.  Messages are UTF-8 text wrapped between a
//!   `0x00` byte and a `0xFF` byte.
//!
//! - **RFC 6455 ("v13")** – the standard.  The handshake echoes a SHA-1
//!   digest of the client key, and messages travel in binary frames with a
//!   variable-length size prefix and an optional XOR mask.
//!
//! This crate defines:
//!
//! - **`protocol`** – How frames look on the wire.  [`encode_frame`] /
//!   [`decode_frame`] for v13 and [`decode_legacy_frame`] for v0.  All parsing
//!   goes through a bounds-checked [`protocol::cursor::ByteCursor`].
//!
//! - **`handshake`** – The pure parts of both handshakes: key generation,
//!   key recovery, the MD5 challenge, the `Sec-WebSocket-Accept` digest, and
//!   request validation.  Reading and writing the handshake bytes happens in
//!   the `wsock` crate.

pub mod handshake;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `wsock_core::Frame` instead of `wsock_core::protocol::frame::Frame`.
pub use handshake::error::HandshakeError;
pub use handshake::headers::Headers;
pub use handshake::request::UpgradeRequest;
pub use protocol::error::ProtocolError;
pub use protocol::frame::{apply_mask, decode_frame, encode_frame, Frame, Opcode};
pub use protocol::legacy::{
    decode_legacy_frame, decode_legacy_frame_from, encode_legacy_close, encode_legacy_text,
    LegacyFrame,
};
