//! RFC 6455 connection: frames in, messages out.
//!
//! # Control frames
//!
//! - **Ping** is answered with a pong carrying the same payload, then handed
//!   to the caller as [`Message::Ping`].
//! - **Close** from the peer is answered with a close frame echoing its status
//!   code (or an empty close if it sent none); the stream is then shut down
//!   and `receive` returns `Ok(None)`.  A code that may not appear on the wire
//!   (reserved or out of range) is answered with 1002 instead.
//! - A frame that fails to decode is answered with a close frame carrying the
//!   matching status code (1002, 1007 or 1009) before the stream is shut down.
//!
//! Client connections mask every outgoing frame with a fresh random key;
//! server connections never mask.

use async_trait::async_trait;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use wsock_core::protocol::frame::{close_code, parse_close_payload, MAX_CONTROL_PAYLOAD_LEN};
use wsock_core::{decode_frame, encode_frame, Frame, Opcode, ProtocolError};

use crate::domain::config::ConnectionConfig;
use crate::domain::message::{ConnectionState, Message, ProtocolVersion, Role};
use crate::error::WsError;
use crate::infrastructure::connection::Connection;
use crate::infrastructure::stream::ByteStream;

/// A negotiated RFC 6455 connection over `S`.
#[derive(Debug)]
pub struct StandardConnection<S> {
    stream: ByteStream<S>,
    role: Role,
    state: ConnectionState,
    config: ConnectionConfig,
    peer: String,
}

fn masking_key() -> [u8; 4] {
    rand::rng().random()
}

/// Close status a decode failure is reported to the peer with.
fn close_code_for(error: &ProtocolError) -> u16 {
    match error {
        ProtocolError::InvalidPayload => close_code::INVALID_FRAME_PAYLOAD,
        ProtocolError::PayloadTooLarge { .. } => close_code::MESSAGE_TOO_BIG,
        _ => close_code::PROTOCOL_ERROR,
    }
}

impl<S> StandardConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a stream whose handshake has already completed.
    ///
    /// Any bytes still buffered in `stream` are treated as the start of the
    /// first frame.
    pub fn new(stream: ByteStream<S>, role: Role, config: ConnectionConfig) -> Self {
        Self {
            stream,
            role,
            state: ConnectionState::Open,
            config,
            peer: "peer".to_string(),
        }
    }

    /// Sets the label used for this connection in log lines.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Sends a close frame with `code` and `reason`, waits for the peer's
    /// close (or end of stream), then shuts the stream down.
    ///
    /// Frames that arrive while waiting are discarded.
    ///
    /// # Errors
    ///
    /// [`WsError::Transport`] if the close frame cannot be written; the
    /// stream is shut down either way.
    pub async fn close_with(&mut self, code: u16, reason: &str) -> Result<(), WsError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closing;
        info!("{}: closing v13 connection with code {code}", self.peer);

        if let Err(e) = self.write_frame(Frame::close(code, reason)).await {
            self.finish().await;
            return Err(e);
        }

        loop {
            match self.read_frame().await {
                Ok(Some(frame)) if frame.opcode == Opcode::Close => {
                    debug!("{}: peer acknowledged close", self.peer);
                    break;
                }
                Ok(Some(frame)) => {
                    debug!("{}: discarding {:?} frame while closing", self.peer, frame.opcode);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("{}: drain ended: {e}", self.peer);
                    break;
                }
            }
        }
        self.finish().await;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), WsError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => Err(WsError::ConnectionClosed),
        }
    }

    async fn write_frame(&mut self, frame: Frame) -> Result<(), WsError> {
        let frame = self.outgoing(frame);
        debug!(
            "{}: sending {:?} frame ({} bytes)",
            self.peer,
            frame.opcode,
            frame.payload.len()
        );
        if let Err(e) = self.stream.write_all(&encode_frame(&frame)).await {
            warn!("{}: write failed: {e}", self.peer);
            self.finish().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Reads one frame.  `Ok(None)` means the stream ended cleanly between
    /// frames.
    async fn read_frame(&mut self) -> Result<Option<Frame>, WsError> {
        loop {
            match decode_frame(self.stream.buffer(), self.config.max_payload_len) {
                Ok((frame, consumed)) => {
                    self.stream.consume(consumed);
                    return Ok(Some(frame));
                }
                Err(e) if e.is_truncated() => {
                    if self.stream.fill().await? == 0 {
                        if self.stream.buffer().is_empty() {
                            return Ok(None);
                        }
                        return Err(e.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reports a decode failure to the peer, then shuts down.
    ///
    /// A frame cut short by end of stream gets no close frame: nobody is left
    /// to read it.
    async fn fail(&mut self, error: WsError) -> WsError {
        warn!("{}: closing after error: {error}", self.peer);
        if let WsError::Protocol(protocol_error) = &error {
            if protocol_error.is_truncated() {
                self.finish().await;
                return error;
            }
            let code = close_code_for(protocol_error);
            // Best effort: the peer may already be gone.
            let close = self.outgoing(Frame::close(code, ""));
            let _ = self.stream.write_all(&encode_frame(&close)).await;
        }
        self.finish().await;
        error
    }

    fn outgoing(&self, frame: Frame) -> Frame {
        match self.role {
            Role::Client => frame.masked(masking_key()),
            Role::Server => frame,
        }
    }

    async fn finish(&mut self) {
        if self.state != ConnectionState::Closed {
            if let Err(e) = self.stream.shutdown().await {
                debug!("{}: shutdown failed: {e}", self.peer);
            }
            self.state = ConnectionState::Closed;
        }
    }

    async fn handle_peer_close(&mut self, payload: &[u8]) -> Result<(), WsError> {
        let reply = match parse_close_payload(payload) {
            Ok(Some((code, reason))) if close_code::is_sendable(code) => {
                info!("{}: peer closed with code {code} {reason:?}", self.peer);
                Frame::close(code, "")
            }
            Ok(Some((code, _))) => {
                warn!("{}: peer closed with invalid code {code}", self.peer);
                Frame::close(close_code::PROTOCOL_ERROR, "")
            }
            Ok(None) => {
                info!("{}: peer closed without a status code", self.peer);
                Frame::close_empty()
            }
            Err(e) => return Err(self.fail(e.into()).await),
        };
        self.write_frame(reply).await?;
        self.finish().await;
        Ok(())
    }
}

#[async_trait]
impl<S> Connection for StandardConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Standard
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), WsError> {
        self.ensure_open()?;
        let text = std::str::from_utf8(payload).map_err(|_| WsError::NotUtf8)?;
        self.write_frame(Frame::text(text)).await
    }

    async fn send_message(&mut self, message: Message) -> Result<(), WsError> {
        self.ensure_open()?;
        let frame = match message {
            Message::Text(text) => Frame::text(text),
            Message::Binary(data) => Frame::binary(data),
            Message::Ping(data) | Message::Pong(data) if data.len() > MAX_CONTROL_PAYLOAD_LEN => {
                return Err(WsError::ControlPayloadTooLarge(data.len()));
            }
            Message::Ping(data) => Frame::ping(data),
            Message::Pong(data) => Frame::pong(data),
            Message::Continuation { payload, fin } => {
                Frame::new(fin, Opcode::Continuation, None, payload)
            }
        };
        self.write_frame(frame).await
    }

    async fn receive(&mut self) -> Result<Option<Message>, WsError> {
        self.ensure_open()?;
        let frame = match self.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("{}: stream ended without a close frame", self.peer);
                self.finish().await;
                return Ok(None);
            }
            Err(e) => return Err(self.fail(e).await),
        };

        match frame.opcode {
            Opcode::Close => {
                self.handle_peer_close(&frame.payload).await?;
                Ok(None)
            }
            Opcode::Ping => {
                self.write_frame(Frame::pong(frame.payload.clone())).await?;
                Ok(Some(Message::Ping(frame.payload)))
            }
            Opcode::Pong => Ok(Some(Message::Pong(frame.payload))),
            Opcode::Text => match String::from_utf8(frame.payload) {
                Ok(text) => Ok(Some(Message::Text(text))),
                Err(_) => Err(self.fail(ProtocolError::InvalidPayload.into()).await),
            },
            Opcode::Binary => Ok(Some(Message::Binary(frame.payload))),
            Opcode::Continuation => Ok(Some(Message::Continuation {
                payload: frame.payload,
                fin: frame.fin,
            })),
        }
    }

    async fn close(&mut self) -> Result<(), WsError> {
        self.close_with(close_code::NORMAL_CLOSURE, "").await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio_test::io::Builder;

    fn server_over(mock: tokio_test::io::Mock) -> StandardConnection<tokio_test::io::Mock> {
        StandardConnection::new(ByteStream::new(mock), Role::Server, ConnectionConfig::default())
    }

    fn client_frame(frame: Frame) -> Vec<u8> {
        encode_frame(&frame.masked([0x11, 0x22, 0x33, 0x44]))
    }

    async fn read_all(peer: &mut DuplexStream) -> Vec<u8> {
        let mut out = Vec::new();
        peer.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_server_send_writes_unmasked_text_frame() {
        let mock = Builder::new().write(&[0x81, 0x02, b'h', b'i']).build();
        let mut conn = server_over(mock);

        conn.send(b"hi").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejects_invalid_utf8_without_writing() {
        let mock = Builder::new().build();
        let mut conn = server_over(mock);

        let err = conn.send(&[0xC3, 0x28]).await.unwrap_err();

        assert!(matches!(err, WsError::NotUtf8));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_receive_unmasks_client_text() {
        let mock = Builder::new().read(&client_frame(Frame::text("hello"))).build();
        let mut conn = server_over(mock);

        let message = conn.receive().await.unwrap();

        assert_eq!(message, Some(Message::Text("hello".to_string())));
    }

    #[tokio::test]
    async fn test_ping_is_answered_and_yielded() {
        let mock = Builder::new()
            .read(&client_frame(Frame::ping("abc")))
            .write(&encode_frame(&Frame::pong("abc")))
            .build();
        let mut conn = server_over(mock);

        let message = conn.receive().await.unwrap();

        assert_eq!(message, Some(Message::Ping(b"abc".to_vec())));
    }

    #[tokio::test]
    async fn test_peer_close_is_echoed_with_its_code() {
        let mock = Builder::new()
            .read(&client_frame(Frame::close(close_code::GOING_AWAY, "bye")))
            .write(&encode_frame(&Frame::close(close_code::GOING_AWAY, "")))
            .build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), None);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(conn.receive().await, Err(WsError::ConnectionClosed)));
        assert!(matches!(conn.send(b"late").await, Err(WsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_peer_close_with_reserved_code_gets_protocol_error() {
        let mock = Builder::new()
            .read(&client_frame(Frame::close(close_code::NO_STATUS_RECEIVED, "")))
            .write(&encode_frame(&Frame::close(close_code::PROTOCOL_ERROR, "")))
            .build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), None);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_peer_close_with_out_of_range_code_gets_protocol_error() {
        let mock = Builder::new()
            .read(&client_frame(Frame::close(5000, "too high")))
            .write(&encode_frame(&Frame::close(close_code::PROTOCOL_ERROR, "")))
            .build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), None);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_peer_close_with_private_code_is_echoed() {
        let mock = Builder::new()
            .read(&client_frame(Frame::close(4000, "")))
            .write(&encode_frame(&Frame::close(4000, "")))
            .build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_close_is_echoed_empty() {
        let mock = Builder::new()
            .read(&client_frame(Frame::close_empty()))
            .write(&[0x88, 0x00])
            .build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let bytes = client_frame(Frame::binary(vec![5u8; 300]));
        let mock = Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..200])
            .read(&bytes[200..])
            .build();
        let mut conn = server_over(mock);

        let message = conn.receive().await.unwrap();

        assert_eq!(message, Some(Message::Binary(vec![5u8; 300])));
    }

    #[tokio::test]
    async fn test_clean_eof_between_frames_ends_stream() {
        let mock = Builder::new().build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), None);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_eof_inside_frame_is_truncated_error() {
        let bytes = client_frame(Frame::text("hello"));
        let mock = Builder::new().read(&bytes[..4]).build();
        let mut conn = server_over(mock);

        let err = conn.receive().await.unwrap_err();

        assert!(matches!(
            err,
            WsError::Protocol(ProtocolError::TruncatedFrame { .. })
        ));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_closes_with_1007() {
        let bad = client_frame(Frame::new(true, Opcode::Text, None, vec![0xFF, 0xFE]));
        let mock = Builder::new()
            .read(&bad)
            .write(&encode_frame(&Frame::close(close_code::INVALID_FRAME_PAYLOAD, "")))
            .build();
        let mut conn = server_over(mock);

        let err = conn.receive().await.unwrap_err();

        assert!(matches!(err, WsError::Protocol(ProtocolError::InvalidPayload)));
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_with_1009() {
        let big = client_frame(Frame::binary(vec![0u8; 64]));
        let mock = Builder::new()
            .read(&big[..8])
            .write(&encode_frame(&Frame::close(close_code::MESSAGE_TOO_BIG, "")))
            .build();
        let config = ConnectionConfig {
            max_payload_len: 16,
            ..ConnectionConfig::default()
        };
        let mut conn = StandardConnection::new(ByteStream::new(mock), Role::Server, config);

        let err = conn.receive().await.unwrap_err();

        assert!(matches!(
            err,
            WsError::Protocol(ProtocolError::PayloadTooLarge { declared: 64, limit: 16 })
        ));
    }

    #[tokio::test]
    async fn test_continuation_frames_are_yielded_unassembled() {
        let mut wire = client_frame(Frame::new(false, Opcode::Binary, None, vec![1]));
        wire.extend(client_frame(Frame::new(true, Opcode::Continuation, None, vec![2])));
        let mock = Builder::new().read(&wire).build();
        let mut conn = server_over(mock);

        assert_eq!(conn.receive().await.unwrap(), Some(Message::Binary(vec![1])));
        assert_eq!(
            conn.receive().await.unwrap(),
            Some(Message::Continuation { payload: vec![2], fin: true })
        );
    }

    #[tokio::test]
    async fn test_oversized_ping_is_caller_error() {
        let mock = Builder::new().build();
        let mut conn = server_over(mock);

        let err = conn.send_message(Message::Ping(vec![0; 126])).await.unwrap_err();

        assert!(err.is_caller_error());
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_client_frames_are_masked() {
        // Arrange
        let (local, mut peer) = duplex(1024);
        let config = ConnectionConfig::default();
        let mut conn = StandardConnection::new(ByteStream::new(local), Role::Client, config);

        // Act
        conn.send(b"masked").await.unwrap();
        drop(conn);
        let wire = read_all(&mut peer).await;

        // Assert: the MASK bit is set and the payload decodes back.
        assert_eq!(wire[1] & 0x80, 0x80);
        let (frame, _) = decode_frame(&wire, 1024).unwrap();
        assert_eq!(frame.payload, b"masked");
        assert!(frame.mask.is_some());
    }

    #[tokio::test]
    async fn test_local_close_drains_until_peer_close() {
        // Arrange
        let (local, mut peer) = duplex(1024);
        let config = ConnectionConfig::default();
        let mut conn = StandardConnection::new(ByteStream::new(local), Role::Server, config);

        let peer_task = tokio::spawn(async move {
            let mut head = [0u8; 2];
            peer.read_exact(&mut head).await.unwrap();
            let mut code = [0u8; 2];
            peer.read_exact(&mut code).await.unwrap();
            // A late data frame, then the close reply.
            peer.write_all(&client_frame(Frame::text("late"))).await.unwrap();
            let close = client_frame(Frame::close(close_code::NORMAL_CLOSURE, ""));
            peer.write_all(&close).await.unwrap();
            (head, code)
        });

        // Act
        conn.close().await.unwrap();
        let (head, code) = peer_task.await.unwrap();

        // Assert
        assert_eq!(head, [0x88, 0x02]);
        assert_eq!(u16::from_be_bytes(code), close_code::NORMAL_CLOSURE);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(conn.close().await.is_ok());
    }
}
