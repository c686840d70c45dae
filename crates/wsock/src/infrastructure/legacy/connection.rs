//! Hixie-76 connection: sentinel-delimited UTF-8 text only.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use wsock_core::protocol::legacy::LEGACY_CLOSE;
use wsock_core::{decode_legacy_frame_from, encode_legacy_text, LegacyFrame};

use crate::domain::config::ConnectionConfig;
use crate::domain::message::{ConnectionState, Message, ProtocolVersion};
use crate::error::WsError;
use crate::infrastructure::connection::Connection;
use crate::infrastructure::stream::ByteStream;

/// A negotiated v0 connection over `S`.
///
/// The draft has no binary or control messages: `send_message` accepts only
/// [`Message::Text`], and `receive` only ever yields text.
#[derive(Debug)]
pub struct LegacyConnection<S> {
    stream: ByteStream<S>,
    state: ConnectionState,
    config: ConnectionConfig,
    peer: String,
    /// Leading buffered bytes already searched for the text terminator.
    scanned: usize,
}

impl<S> LegacyConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps a stream whose handshake has already completed.
    pub fn new(stream: ByteStream<S>, config: ConnectionConfig) -> Self {
        Self {
            stream,
            state: ConnectionState::Open,
            config,
            peer: "peer".to_string(),
            scanned: 0,
        }
    }

    /// Sets the label used for this connection in log lines.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn ensure_open(&self) -> Result<(), WsError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closing | ConnectionState::Closed => Err(WsError::ConnectionClosed),
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), WsError> {
        if let Err(e) = self.stream.write_all(bytes).await {
            warn!("{}: write failed: {e}", self.peer);
            self.finish().await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<LegacyFrame>, WsError> {
        loop {
            let buffered = self.stream.buffer();
            match decode_legacy_frame_from(buffered, self.config.max_payload_len, self.scanned) {
                Ok((frame, consumed)) => {
                    self.stream.consume(consumed);
                    self.scanned = 0;
                    return Ok(Some(frame));
                }
                Err(e) if e.is_truncated() => {
                    self.scanned = buffered.len();
                    if self.stream.fill().await? == 0 {
                        if self.stream.buffer().is_empty() {
                            return Ok(None);
                        }
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    self.scanned = 0;
                    return Err(e.into());
                }
            }
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
}

#[async_trait]
impl<S> Connection for LegacyConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::Legacy
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), WsError> {
        self.ensure_open()?;
        let text = std::str::from_utf8(payload).map_err(|_| WsError::NotUtf8)?;
        debug!("{}: sending v0 text ({} bytes)", self.peer, text.len());
        self.write(&encode_legacy_text(text)).await
    }

    async fn send_message(&mut self, message: Message) -> Result<(), WsError> {
        match message {
            Message::Text(text) => self.send(text.as_bytes()).await,
            other => Err(WsError::UnsupportedMessage { kind: other.kind() }),
        }
    }

    async fn receive(&mut self) -> Result<Option<Message>, WsError> {
        self.ensure_open()?;
        match self.read_frame().await {
            Ok(Some(LegacyFrame::Text(text))) => Ok(Some(Message::Text(text))),
            Ok(Some(LegacyFrame::Close)) => {
                info!("{}: peer sent v0 close", self.peer);
                self.write(&LEGACY_CLOSE).await?;
                self.finish().await;
                Ok(None)
            }
            Ok(None) => {
                info!("{}: stream ended without a close signal", self.peer);
                self.finish().await;
                Ok(None)
            }
            Err(e) => {
                warn!("{}: closing after error: {e}", self.peer);
                self.finish().await;
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<(), WsError> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closing;
        info!("{}: closing v0 connection", self.peer);
        self.write(&LEGACY_CLOSE).await?;

        loop {
            match self.read_frame().await {
                Ok(Some(LegacyFrame::Close)) | Ok(None) => break,
                Ok(Some(LegacyFrame::Text(_))) => {
                    debug!("{}: discarding text while closing", self.peer);
                }
                Err(e) => {
                    debug!("{}: drain ended: {e}", self.peer);
                    break;
                }
            }
        }
        self.finish().await;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
