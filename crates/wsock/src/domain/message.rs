//! Message-level types shared by both protocol eras.

use std::fmt;

/// A message delivered to or accepted from the application.
///
/// Legacy (v0) connections only ever carry [`Message::Text`].  Close frames
/// never surface as messages: a received close ends the stream instead (see
/// [`crate::infrastructure::Connection::receive`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// A continuation frame, yielded as-is.  Fragmented messages are not
    /// reassembled; `fin` marks the last fragment.
    Continuation { payload: Vec<u8>, fin: bool },
}

impl Message {
    /// Short name used in log lines and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text(_) => "text",
            Message::Binary(_) => "binary",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::Continuation { .. } => "continuation",
        }
    }

    /// The message body as bytes.
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Continuation { payload, .. } => payload,
        }
    }

    /// Returns the text if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Where a connection is in its lifecycle.
///
/// Connections are only constructed once a handshake has succeeded, so the
/// first observable state is `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Messages flow in both directions.
    Open,
    /// We sent a close frame and are draining until the peer answers.
    Closing,
    /// The stream has been shut down; every further call fails immediately.
    Closed,
}

/// Which protocol era a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Hixie-76.
    Legacy,
    /// RFC 6455.
    Standard,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::Legacy => f.write_str("v0"),
            ProtocolVersion::Standard => f.write_str("v13"),
        }
    }
}

/// Which end of the connection we are.
///
/// RFC 6455 clients must mask every frame they send and servers must not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
