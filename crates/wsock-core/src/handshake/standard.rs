//! RFC 6455 ("v13") opening handshake.
//!
//! The server proves it understood the upgrade by hashing the client's
//! `Sec-WebSocket-Key` together with a fixed GUID:
//!
//! ```text
//! Sec-WebSocket-Accept = Base64( SHA-1( key ++ "258EAFA5-E914-47DA-95CA-C5AB0DC85B11" ) )
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::Rng;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::handshake::error::HandshakeError;
use crate::handshake::headers::Headers;
use crate::handshake::request::UpgradeRequest;
use crate::handshake::write_header;

/// GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this implementation speaks.
pub const SUPPORTED_VERSION: &str = "13";

/// Decoded length of a valid `Sec-WebSocket-Key`.
pub const KEY_LEN: usize = 16;

/// Headers the client request writes itself; caller copies are skipped.
const RESERVED_CLIENT_HEADERS: [&str; 5] = [
    "Host",
    "Upgrade",
    "Connection",
    "Sec-WebSocket-Key",
    "Sec-WebSocket-Version",
];

/// Computes `Sec-WebSocket-Accept` for a client key.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Generates a fresh client key: 16 random bytes, Base64-encoded.
pub fn generate_client_key<R: Rng>(rng: &mut R) -> String {
    let mut nonce = [0u8; KEY_LEN];
    rng.fill(&mut nonce);
    BASE64.encode(nonce)
}

/// Replaces the first "localhost" with its loopback address so a request for
/// `localhost:8080` matches a listener bound to `127.0.0.1:8080`.
pub fn normalize_host(host: &str) -> String {
    host.replacen("localhost", "127.0.0.1", 1)
}

// ── Server side ───────────────────────────────────────────────────────────────

/// The negotiated parameters of an accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardAccept {
    pub accept_key: String,
    /// First requested subprotocol, echoed back verbatim.
    pub protocol: Option<String>,
    /// First requested extension (parameters stripped), echoed back verbatim.
    pub extensions: Option<String>,
}

impl StandardAccept {
    /// Renders the `101 Switching Protocols` response.
    pub fn response_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(160);
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        write_header(&mut buf, "Upgrade", "websocket");
        write_header(&mut buf, "Connection", "Upgrade");
        write_header(&mut buf, "Sec-WebSocket-Accept", &self.accept_key);
        if let Some(protocol) = &self.protocol {
            write_header(&mut buf, "Sec-WebSocket-Protocol", protocol);
        }
        if let Some(extensions) = &self.extensions {
            write_header(&mut buf, "Sec-WebSocket-Extensions", extensions);
        }
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Validates a v13 upgrade request against the server bound to `local_host`.
///
/// Checks run in a fixed order and the first failure wins, so a request with
/// a bad version is answered with 426 only after the header and key checks
/// pass, and no host comparison happens for it.
///
/// # Errors
///
/// Returns the [`HandshakeError`] for the first failed check; its
/// [`HandshakeError::status`] is the status to send back.
pub fn validate_upgrade_request(
    request: &UpgradeRequest,
    local_host: &str,
) -> Result<StandardAccept, HandshakeError> {
    let headers = &request.headers;

    let upgrade = headers.get("Upgrade");
    if !upgrade.is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket")) {
        return Err(reject(HandshakeError::InvalidUpgradeHeader(upgrade.map(str::to_string))));
    }

    let connection = headers.get("Connection");
    if !connection.is_some_and(|v| v.to_ascii_lowercase().contains("upgrade")) {
        return Err(reject(HandshakeError::InvalidConnectionHeader(
            connection.map(str::to_string),
        )));
    }

    let key = headers.get("Sec-WebSocket-Key").map(str::trim).unwrap_or("");
    if !is_valid_client_key(key) {
        return Err(reject(HandshakeError::InvalidKey));
    }

    let version = headers.get("Sec-WebSocket-Version");
    if version.map(str::trim) != Some(SUPPORTED_VERSION) {
        return Err(reject(HandshakeError::UnsupportedVersion(version.map(str::to_string))));
    }

    let host = request.host();
    if host.map(normalize_host).as_deref() != Some(local_host) {
        return Err(reject(HandshakeError::HostMismatch {
            expected: local_host.to_string(),
            actual: host.map(str::to_string),
        }));
    }

    Ok(StandardAccept {
        accept_key: compute_accept_key(key),
        protocol: first_token(headers.get("Sec-WebSocket-Protocol"), ','),
        extensions: first_token(headers.get("Sec-WebSocket-Extensions"), ';'),
    })
}

fn reject(error: HandshakeError) -> HandshakeError {
    debug!("rejecting v13 upgrade: {error}");
    error
}

fn is_valid_client_key(key: &str) -> bool {
    BASE64
        .decode(key)
        .map(|bytes| bytes.len() == KEY_LEN)
        .unwrap_or(false)
}

fn first_token(value: Option<&str>, separator: char) -> Option<String> {
    let value = value?;
    let token = value.split(separator).next().unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ── Client side ───────────────────────────────────────────────────────────────

/// Renders a client upgrade request.
///
/// `headers` may add e.g. `Origin` or `Sec-WebSocket-Protocol`; any copy of a
/// header this function writes itself is skipped.
pub fn client_request_bytes(host: &str, path: &str, key: &str, headers: &Headers) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(format!("GET {path} HTTP/1.1\r\n").as_bytes());
    write_header(&mut buf, "Host", host);
    write_header(&mut buf, "Upgrade", "websocket");
    write_header(&mut buf, "Connection", "Upgrade");
    write_header(&mut buf, "Sec-WebSocket-Key", key);
    write_header(&mut buf, "Sec-WebSocket-Version", SUPPORTED_VERSION);
    for (name, value) in headers.iter() {
        if RESERVED_CLIENT_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            continue;
        }
        write_header(&mut buf, name, value);
    }
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Checks a server's response to a request sent with `key`.
///
/// # Errors
///
/// [`HandshakeError::UnexpectedStatus`] for any status but 101,
/// [`HandshakeError::HeaderMismatch`] / [`HandshakeError::MissingHeader`] for
/// bad `Upgrade`/`Connection` headers, and [`HandshakeError::AcceptMismatch`]
/// when the echoed digest is wrong.
pub fn validate_server_response(
    status: u16,
    headers: &Headers,
    key: &str,
) -> Result<(), HandshakeError> {
    if status != 101 {
        return Err(HandshakeError::UnexpectedStatus(status.to_string()));
    }

    let upgrade = headers.get("Upgrade").ok_or(HandshakeError::MissingHeader("Upgrade"))?;
    if !upgrade.trim().eq_ignore_ascii_case("websocket") {
        return Err(HandshakeError::HeaderMismatch {
            header: "Upgrade",
            expected: "websocket".to_string(),
            actual: upgrade.to_string(),
        });
    }

    let connection = headers
        .get("Connection")
        .ok_or(HandshakeError::MissingHeader("Connection"))?;
    if !connection.to_ascii_lowercase().contains("upgrade") {
        return Err(HandshakeError::HeaderMismatch {
            header: "Connection",
            expected: "Upgrade".to_string(),
            actual: connection.to_string(),
        });
    }

    let accept = headers
        .get("Sec-WebSocket-Accept")
        .ok_or(HandshakeError::MissingHeader("Sec-WebSocket-Accept"))?;
    if accept.trim() != compute_accept_key(key) {
        return Err(HandshakeError::AcceptMismatch);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
