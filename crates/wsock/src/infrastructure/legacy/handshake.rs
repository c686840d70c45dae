//! Hixie-76 opening handshake over a live stream.
//!
//! ```text
//! client                                   server
//!   GET + Key1 + Key2, blank line, key3 ─►
//!                                          read head, then 8 bytes of key3
//!                                          digest = MD5(n1 ‖ n2 ‖ key3)
//!   ◄─ 101 + Location + Origin, blank line, digest
//!   compare digest
//! ```

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use wsock_core::handshake::legacy::{
    client_request_bytes, compute_challenge_response, generate_challenge, generate_key, location,
    parse_response_head, server_digest, server_response_bytes, validate_legacy_request,
    validate_response_fields, verify_challenge_reply, LegacyKey, CHALLENGE_LEN, DIGEST_LEN,
};
use wsock_core::handshake::rejection_response;
use wsock_core::{HandshakeError, Headers, UpgradeRequest};

use super::connection::LegacyConnection;
use crate::domain::config::ConnectionConfig;
use crate::error::WsError;
use crate::infrastructure::http::MAX_HEAD_LEN;
use crate::infrastructure::stream::ByteStream;

/// Completes the server side of a v0 handshake.
///
/// `request` has already been read from `stream`; the 8-byte challenge that
/// follows the request head is read here.  `local_host` goes into
/// `Sec-WebSocket-Location`.
///
/// On rejection a 400 is written and the stream shut down.
///
/// # Errors
///
/// [`WsError::HandshakeRejected`] for bad headers, unusable keys, or a stream
/// that ends before the challenge ([`HandshakeError::MissingChallenge`]);
/// [`WsError::Transport`] if a response cannot be written.
pub async fn accept_legacy<S>(
    mut stream: ByteStream<S>,
    request: &UpgradeRequest,
    local_host: &str,
    config: ConnectionConfig,
) -> Result<LegacyConnection<S>, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let digest = match server_challenge(&mut stream, request).await {
        Ok(digest) => digest,
        Err(WsError::HandshakeRejected(e)) => {
            warn!("v0 handshake rejected: {e}");
            stream.write_all(&rejection_response(&e)).await?;
            if let Err(shutdown) = stream.shutdown().await {
                debug!("shutdown after rejection failed: {shutdown}");
            }
            return Err(e.into());
        }
        Err(e) => return Err(e),
    };

    let location = location(local_host, &request.path);
    stream
        .write_all(&server_response_bytes(request, &location, &digest))
        .await?;
    info!("v0 handshake accepted for {location}");
    Ok(LegacyConnection::new(stream, config))
}

async fn server_challenge<S>(
    stream: &mut ByteStream<S>,
    request: &UpgradeRequest,
) -> Result<[u8; DIGEST_LEN], WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    validate_legacy_request(request)?;
    let challenge: [u8; CHALLENGE_LEN] = stream.read_array().await.map_err(|e| {
        debug!("challenge read failed: {e}");
        HandshakeError::MissingChallenge
    })?;
    let headers = &request.headers;
    let digest = server_digest(
        headers.get_or_empty("Sec-WebSocket-Key1"),
        headers.get_or_empty("Sec-WebSocket-Key2"),
        &challenge,
    )?;
    Ok(digest)
}

/// Keys for one client handshake, drawn together so no random source lives
/// across an await.
struct ClientKeys {
    key1: LegacyKey,
    key2: LegacyKey,
    key3: [u8; CHALLENGE_LEN],
}

impl ClientKeys {
    fn generate() -> Self {
        let mut rng = rand::rng();
        Self {
            key1: generate_key(&mut rng),
            key2: generate_key(&mut rng),
            key3: generate_challenge(&mut rng),
        }
    }

    fn request_bytes(&self, path: &str, headers: &Headers) -> Vec<u8> {
        client_request_bytes(path, &self.key1.key, &self.key2.key, headers, &self.key3)
    }

    fn expected_digest(&self) -> [u8; DIGEST_LEN] {
        compute_challenge_response(self.key1.number, self.key2.number, &self.key3)
    }
}

/// Runs the client side of a v0 handshake over `stream`.
///
/// `headers` should carry `Host` and `Origin`; the server must echo `Origin`
/// back as `Sec-WebSocket-Origin`.  A requested `Sec-WebSocket-Protocol` must
/// be echoed exactly.
///
/// # Errors
///
/// [`WsError::HandshakeRejected`] if the response head or the 16-byte digest
/// is wrong, [`WsError::Transport`] if the stream fails.  The stream is shut
/// down on failure.
pub async fn connect_legacy<S>(
    stream: S,
    path: &str,
    headers: &Headers,
    config: ConnectionConfig,
) -> Result<LegacyConnection<S>, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    connect_with_keys(stream, path, headers, ClientKeys::generate(), config).await
}

async fn connect_with_keys<S>(
    stream: S,
    path: &str,
    headers: &Headers,
    keys: ClientKeys,
    config: ConnectionConfig,
) -> Result<LegacyConnection<S>, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut stream = ByteStream::with_capacity(stream, config.read_buffer_size);
    match client_handshake(&mut stream, path, headers, &keys).await {
        Ok(()) => {
            info!("v0 handshake for {path} complete");
            let peer = headers.get("Host").unwrap_or("server").to_string();
            Ok(LegacyConnection::new(stream, config).with_peer(peer))
        }
        Err(e) => {
            warn!("v0 handshake for {path} failed: {e}");
            if let Err(shutdown) = stream.shutdown().await {
                debug!("shutdown after failed handshake failed: {shutdown}");
            }
            Err(e)
        }
    }
}

async fn client_handshake<S>(
    stream: &mut ByteStream<S>,
    path: &str,
    headers: &Headers,
    keys: &ClientKeys,
) -> Result<(), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    stream.write_all(&keys.request_bytes(path, headers)).await?;

    let head = loop {
        if let Some(head) = parse_response_head(stream.buffer())? {
            break head;
        }
        if stream.buffer().len() > MAX_HEAD_LEN {
            return Err(HandshakeError::MalformedResponse(format!(
                "response head exceeds {MAX_HEAD_LEN} bytes"
            ))
            .into());
        }
        if stream.fill().await? == 0 {
            let reason = "stream ended inside the response head".to_string();
            return Err(HandshakeError::MalformedResponse(reason).into());
        }
    };
    stream.consume(head.consumed);
    validate_response_fields(&head.fields, headers)?;

    let reply: [u8; DIGEST_LEN] = stream.read_array().await?;
    verify_challenge_reply(&keys.expected_digest(), &reply)?;
    Ok(())
}

/// Connects to `addr` over TCP and runs [`connect_legacy`].
///
/// `Host` defaults to `addr` when `headers` does not set it.
pub async fn connect_legacy_tcp(
    addr: &str,
    path: &str,
    headers: &Headers,
    config: ConnectionConfig,
) -> Result<LegacyConnection<TcpStream>, WsError> {
    let stream = TcpStream::connect(addr).await?;
    if headers.contains("Host") {
        connect_legacy(stream, path, headers, config).await
    } else {
        let headers = headers.clone().with("Host", addr);
        connect_legacy(stream, path, &headers, config).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
