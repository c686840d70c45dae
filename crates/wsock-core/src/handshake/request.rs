//! The request metadata a handshake needs from the host HTTP layer.

use crate::handshake::headers::Headers;

/// An HTTP upgrade request whose request line has already been read.
///
/// This is everything the handshakes consume from the HTTP layer: method,
/// path and headers.  The body (the Hixie-76 challenge) is read from the
/// stream itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub method: String,
    pub path: String,
    pub headers: Headers,
}

impl UpgradeRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>, headers: Headers) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers,
        }
    }

    /// The host the client addressed, from the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.headers.get("Host")
    }

    /// `true` when the request carries the Hixie-76 key headers.
    ///
    /// RFC 6455 requests never send `Sec-WebSocket-Key1`, so its presence is
    /// enough to pick the legacy handshake.
    pub fn is_legacy(&self) -> bool {
        self.headers.contains("Sec-WebSocket-Key1")
    }
}
