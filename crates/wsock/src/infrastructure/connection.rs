//! The message-level surface shared by both protocol eras.
//!
//! A handshake returns a concrete [`LegacyConnection`] or
//! [`StandardConnection`]; code that serves both eras holds either behind
//! `Box<dyn Connection>`.
//!
//! [`LegacyConnection`]: crate::infrastructure::legacy::LegacyConnection
//! [`StandardConnection`]: crate::infrastructure::standard::StandardConnection

use async_trait::async_trait;

use crate::domain::message::{ConnectionState, Message, ProtocolVersion};
use crate::error::WsError;

/// A negotiated WebSocket connection.
///
/// Every method takes `&mut self`: one task drives a connection at a time.
/// Once the state is [`ConnectionState::Closed`], `send`, `send_message` and
/// `receive` fail with [`WsError::ConnectionClosed`] without touching the
/// stream.
#[async_trait]
pub trait Connection: Send {
    /// Which protocol era this connection speaks.
    fn version(&self) -> ProtocolVersion;

    fn state(&self) -> ConnectionState;

    /// Sends `payload` as one text message.
    ///
    /// # Errors
    ///
    /// [`WsError::NotUtf8`] if `payload` is not UTF-8 (nothing is written and
    /// the connection stays open), otherwise any transport failure.
    async fn send(&mut self, payload: &[u8]) -> Result<(), WsError>;

    /// Sends any kind of message.
    ///
    /// # Errors
    ///
    /// [`WsError::UnsupportedMessage`] for kinds the protocol cannot carry.
    async fn send_message(&mut self, message: Message) -> Result<(), WsError>;

    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the peer has closed: the close has been
    /// answered and the stream shut down.
    ///
    /// # Errors
    ///
    /// Decode and transport failures close the connection and are returned.
    async fn receive(&mut self) -> Result<Option<Message>, WsError>;

    /// Sends a close frame, drains until the peer's close or end of stream,
    /// and shuts the stream down.  Closing a closed connection is a no-op.
    async fn close(&mut self) -> Result<(), WsError>;
}
