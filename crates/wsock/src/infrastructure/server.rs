//! Echo server: accept loop and per-client task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Reading each client's HTTP request head.
//! 3. Answering 404 for any request that is not `GET` on the configured path.
//! 4. Picking the protocol era from the request headers and running the
//!    matching handshake.
//! 5. Handing the connection to an [`EchoSession`].
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! Each client runs in its own Tokio task, so one slow client never delays
//! the accept loop.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::application::echo::EchoSession;
use crate::domain::config::ServerConfig;
use crate::infrastructure::connection::Connection;
use crate::infrastructure::http::{read_request, respond_status};
use crate::infrastructure::legacy::accept_legacy;
use crate::infrastructure::standard::accept_standard;
use crate::infrastructure::stream::ByteStream;

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the accept loop until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (e.g. the port is already
/// in use).
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!(
        "wsock echo server listening on ws://{}{}",
        config.bind_addr, config.path
    );
    serve(listener, Arc::new(config), running).await;
    Ok(())
}

/// Accepts clients from an already bound `listener` until `running` is
/// cleared.
pub async fn serve(listener: TcpListener, config: Arc<ServerConfig>, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the flag while idle.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                tokio::spawn(async move {
                    handle_client(stream, peer_addr, cfg).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
}

// ── Per-client handler ────────────────────────────────────────────────────────

async fn handle_client(stream: TcpStream, peer_addr: SocketAddr, config: Arc<ServerConfig>) {
    match run_client(stream, peer_addr, &config).await {
        Ok(()) => info!("client {peer_addr} finished"),
        Err(e) => warn!("client {peer_addr} finished with error: {e:#}"),
    }
}

async fn run_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    // The v13 host check and the v0 Location both use the address the client
    // actually reached, which differs from `bind_addr` when bound to 0.0.0.0.
    let local_host = stream
        .local_addr()
        .context("failed to read local address")?
        .to_string();
    serve_connection(stream, &peer_addr.to_string(), &local_host, config).await
}

/// Runs one client from request head to close over any stream.
///
/// `local_host` is the `host:port` this server is reached at.
///
/// # Errors
///
/// Returns an error if the request cannot be read, the handshake is rejected,
/// or the session fails.  A request for another path is answered with 404 and
/// is not an error.
pub async fn serve_connection<S>(
    stream: S,
    peer: &str,
    local_host: &str,
    config: &ServerConfig,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let conn_config = config.connection_config();
    let mut stream = ByteStream::with_capacity(stream, conn_config.read_buffer_size);
    let request = read_request(&mut stream)
        .await
        .with_context(|| format!("failed to read request from {peer}"))?;

    if request.method != "GET" || request.path != config.path {
        info!("{peer}: {} {} not found", request.method, request.path);
        respond_status(&mut stream, 404, "Not Found").await?;
        return Ok(());
    }

    let conn: Box<dyn Connection> = if request.is_legacy() {
        let conn = accept_legacy(stream, &request, local_host, conn_config)
            .await
            .with_context(|| format!("v0 handshake with {peer} failed"))?;
        Box::new(conn.with_peer(peer))
    } else {
        let conn = accept_standard(stream, &request, local_host, conn_config)
            .await
            .with_context(|| format!("v13 handshake with {peer} failed"))?;
        Box::new(conn.with_peer(peer))
    };

    info!("{peer}: {} session established", conn.version());
    let echoed = EchoSession::new(conn, config.greeting.clone())
        .run()
        .await
        .with_context(|| format!("echo session with {peer} failed"))?;
    info!("{peer}: echoed {echoed} messages");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use wsock_core::Headers;

    use crate::domain::config::ConnectionConfig;
    use crate::domain::message::Message;
    use crate::infrastructure::standard::connect_standard_tcp;

    const LOCAL: &str = "127.0.0.1:6969";

    async fn run_raw(request: &[u8]) -> (anyhow::Result<()>, Vec<u8>) {
        let (mut client, server_io) = duplex(4096);
        let config = ServerConfig::default();
        let server =
            tokio::spawn(async move { serve_connection(server_io, "test", LOCAL, &config).await });
        client.write_all(request).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        (server.await.unwrap(), response)
    }

    #[tokio::test]
    async fn test_unknown_path_gets_404() {
        let request = b"GET /other HTTP/1.1\r\nHost: 127.0.0.1:6969\r\n\r\n";
        let (result, response) = run_raw(request).await;

        assert!(result.is_ok());
        assert_eq!(response, b"HTTP/1.1 404 Not Found\r\n\r\n");
    }

    #[tokio::test]
    async fn test_post_gets_404() {
        let request = b"POST /ws HTTP/1.1\r\nHost: 127.0.0.1:6969\r\n\r\n";
        let (result, response) = run_raw(request).await;

        assert!(result.is_ok());
        assert_eq!(response, b"HTTP/1.1 404 Not Found\r\n\r\n");
    }

    #[tokio::test]
    async fn test_wrong_version_gets_426() {
        let (result, response) = run_raw(
            b"GET /ws HTTP/1.1\r\nHost: 127.0.0.1:6969\r\nUpgrade: websocket\r\n\
Connection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 8\r\n\r\n",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(
            response,
            b"HTTP/1.1 426 Upgrade Required\r\nSec-WebSocket-Version: 13\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn test_run_server_stops_when_flag_cleared() {
        // Arrange: port 0 lets the OS pick a free port.
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ServerConfig::default()
        };
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(run_server(config, Arc::clone(&running)));

        // Act
        tokio::time::sleep(Duration::from_millis(50)).await;
        running.store(false, Ordering::Relaxed);

        // Assert: the loop notices the flag within one accept timeout.
        let result = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wildcard_bind_checks_host_against_accepted_address() {
        // Arrange: bound to 0.0.0.0 but reached through loopback, so the
        // request's Host names 127.0.0.1 rather than the bind address.
        let listener = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        let config = Arc::new(ServerConfig::default());
        let running = Arc::new(AtomicBool::new(true));
        let server = tokio::spawn(serve(listener, Arc::clone(&config), Arc::clone(&running)));

        // Act
        let conn_config = ConnectionConfig::default();
        let mut conn = connect_standard_tcp(&addr, "/ws", &Headers::new(), conn_config)
            .await
            .unwrap();
        let greeting = conn.receive().await.unwrap();
        conn.close().await.unwrap();
        running.store(false, Ordering::Relaxed);

        // Assert
        assert_eq!(greeting, Some(Message::Text(config.greeting.clone())));
        timeout(Duration::from_secs(2), server).await.unwrap().unwrap();
    }
}
