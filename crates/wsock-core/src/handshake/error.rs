//! Handshake failure reasons.

use thiserror::Error;

/// Why a handshake was rejected, by either side.
///
/// Server-side variants map to the HTTP status written back to the client via
/// [`HandshakeError::status`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The request head could not be parsed as HTTP/1.1.
    #[error("malformed upgrade request: {0}")]
    MalformedRequest(String),

    /// `Upgrade` is missing or is not "websocket".
    #[error("invalid Upgrade header: {0:?}")]
    InvalidUpgradeHeader(Option<String>),

    /// `Connection` is missing or does not mention "upgrade".
    #[error("invalid Connection header: {0:?}")]
    InvalidConnectionHeader(Option<String>),

    /// `Sec-WebSocket-Key` is missing or does not decode to 16 bytes.
    #[error("missing or invalid Sec-WebSocket-Key")]
    InvalidKey,

    /// `Sec-WebSocket-Version` is not 13.
    #[error("unsupported Sec-WebSocket-Version: {0:?}")]
    UnsupportedVersion(Option<String>),

    /// The request targets a host other than the one this server is bound to.
    #[error("host mismatch: request for {actual:?}, server bound to {expected}")]
    HostMismatch { expected: String, actual: Option<String> },

    /// A Hixie-76 key header is empty or cannot produce a key number.
    #[error("invalid {header}: {reason}")]
    InvalidLegacyKey {
        header: &'static str,
        reason: &'static str,
    },

    /// The 8-byte Hixie-76 challenge did not follow the request head.
    #[error("missing 8-byte challenge after request headers")]
    MissingChallenge,

    /// The server answered with a status other than 101.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(String),

    /// The response head could not be tokenized.
    #[error("malformed handshake response: {0}")]
    MalformedResponse(String),

    /// A required response header is absent.
    #[error("missing response header: {0}")]
    MissingHeader(&'static str),

    /// A response header does not carry the expected value.
    #[error("unexpected {header} header: expected {expected:?}, got {actual:?}")]
    HeaderMismatch {
        header: &'static str,
        expected: String,
        actual: String,
    },

    /// `Sec-WebSocket-Accept` does not match the digest of the key we sent.
    #[error("Sec-WebSocket-Accept does not match the request key")]
    AcceptMismatch,

    /// The 16-byte Hixie-76 reply does not match the expected MD5 digest.
    #[error("challenge mismatch: expected {}, got {}", hex(.expected), hex(.actual))]
    ChallengeMismatch { expected: [u8; 16], actual: [u8; 16] },
}

impl HandshakeError {
    /// HTTP status a server writes when rejecting a request for this reason.
    pub fn status(&self) -> u16 {
        match self {
            HandshakeError::UnsupportedVersion(_) => 426,
            _ => 400,
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
