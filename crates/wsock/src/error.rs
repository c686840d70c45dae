//! Error type for connection-level operations.

use thiserror::Error;
use wsock_core::{HandshakeError, ProtocolError};

/// Errors surfaced by handshakes and connections.
///
/// None of these are retried internally.  Every variant except the caller
/// errors (see [`WsError::is_caller_error`]) leaves the connection closed.
#[derive(Debug, Error)]
pub enum WsError {
    /// Reading from or writing to the underlying stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A handshake check failed on either side.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(#[from] HandshakeError),

    /// The peer sent bytes that do not form a valid frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection is already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A text payload passed to `send` is not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// The protocol version cannot carry this kind of message.
    #[error("{kind} messages cannot be sent over a v0 connection")]
    UnsupportedMessage { kind: &'static str },

    /// A ping or pong payload is over the 125-byte control frame limit.
    #[error("control frame payload of {0} bytes exceeds 125")]
    ControlPayloadTooLarge(usize),
}

impl WsError {
    /// `true` for errors caused by the caller's arguments rather than the
    /// connection; the connection stays usable after them.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            WsError::NotUtf8
                | WsError::UnsupportedMessage { .. }
                | WsError::ControlPayloadTooLarge(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors() {
        assert!(WsError::NotUtf8.is_caller_error());
        assert!(WsError::UnsupportedMessage { kind: "binary" }.is_caller_error());
        assert!(!WsError::ConnectionClosed.is_caller_error());
    }

    #[test]
    fn test_handshake_error_converts() {
        let err: WsError = HandshakeError::InvalidKey.into();
        assert!(matches!(err, WsError::HandshakeRejected(HandshakeError::InvalidKey)));
    }
}
