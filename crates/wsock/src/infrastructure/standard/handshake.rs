//! RFC 6455 opening handshake over a live stream.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use wsock_core::handshake::rejection_response;
use wsock_core::handshake::standard::{
    client_request_bytes, generate_client_key, validate_server_response, validate_upgrade_request,
};
use wsock_core::{Headers, UpgradeRequest};

use super::connection::StandardConnection;
use crate::domain::config::ConnectionConfig;
use crate::domain::message::Role;
use crate::error::WsError;
use crate::infrastructure::http::read_response;
use crate::infrastructure::stream::ByteStream;

fn client_key() -> String {
    generate_client_key(&mut rand::rng())
}

/// Completes the server side of a v13 handshake.
///
/// `request` has already been read from `stream`; `local_host` is the
/// `host:port` the server is reachable at and must match the request's
/// `Host` header (with `localhost` normalized to `127.0.0.1`).
///
/// On success the 101 response has been written.  On rejection a 400 (or 426
/// with `Sec-WebSocket-Version: 13` for a version mismatch) is written and the
/// stream shut down.
///
/// # Errors
///
/// [`WsError::HandshakeRejected`] for a failed check, or
/// [`WsError::Transport`] if a response cannot be written.
pub async fn accept_standard<S>(
    mut stream: ByteStream<S>,
    request: &UpgradeRequest,
    local_host: &str,
    config: ConnectionConfig,
) -> Result<StandardConnection<S>, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let accept = match validate_upgrade_request(request, local_host) {
        Ok(accept) => accept,
        Err(e) => {
            warn!("v13 handshake rejected with {}: {e}", e.status());
            stream.write_all(&rejection_response(&e)).await?;
            if let Err(shutdown) = stream.shutdown().await {
                debug!("shutdown after rejection failed: {shutdown}");
            }
            return Err(e.into());
        }
    };

    stream.write_all(&accept.response_bytes()).await?;
    info!(
        "v13 handshake accepted for {} (protocol {:?})",
        request.path, accept.protocol
    );
    Ok(StandardConnection::new(stream, Role::Server, config))
}

/// Runs the client side of a v13 handshake over `stream`.
///
/// `host` is sent as the `Host` header.  `headers` may add `Origin`,
/// `Sec-WebSocket-Protocol` and the like; headers the handshake writes itself
/// are ignored.
///
/// # Errors
///
/// [`WsError::HandshakeRejected`] if the server's response fails validation,
/// [`WsError::Transport`] if the stream fails.  The stream is shut down on
/// failure.
pub async fn connect_standard<S>(
    stream: S,
    host: &str,
    path: &str,
    headers: &Headers,
    config: ConnectionConfig,
) -> Result<StandardConnection<S>, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    connect_with_key(stream, host, path, headers, &client_key(), config).await
}

async fn connect_with_key<S>(
    stream: S,
    host: &str,
    path: &str,
    headers: &Headers,
    key: &str,
    config: ConnectionConfig,
) -> Result<StandardConnection<S>, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut stream = ByteStream::with_capacity(stream, config.read_buffer_size);
    match client_handshake(&mut stream, host, path, headers, key).await {
        Ok(()) => {
            info!("v13 handshake with {host}{path} complete");
            Ok(StandardConnection::new(stream, Role::Client, config).with_peer(host))
        }
        Err(e) => {
            warn!("v13 handshake with {host}{path} failed: {e}");
            if let Err(shutdown) = stream.shutdown().await {
                debug!("shutdown after failed handshake failed: {shutdown}");
            }
            Err(e)
        }
    }
}

async fn client_handshake<S>(
    stream: &mut ByteStream<S>,
    host: &str,
    path: &str,
    headers: &Headers,
    key: &str,
) -> Result<(), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    stream.write_all(&client_request_bytes(host, path, key, headers)).await?;
    let response = read_response(stream).await?;
    validate_server_response(response.status, &response.headers, key)?;
    Ok(())
}

/// Connects to `addr` over TCP and runs [`connect_standard`] with `addr` as
/// the `Host` header.
pub async fn connect_standard_tcp(
    addr: &str,
    path: &str,
    headers: &Headers,
    config: ConnectionConfig,
) -> Result<StandardConnection<TcpStream>, WsError> {
    let stream = TcpStream::connect(addr).await?;
    connect_standard(stream, addr, path, headers, config).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
