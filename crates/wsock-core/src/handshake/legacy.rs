//! Hixie-76 ("v0") opening handshake.
//!
//! # How the challenge works (for beginners)
//!
//! The client hides two numbers in the `Sec-WebSocket-Key1` and
//! `Sec-WebSocket-Key2` headers.  Each key is the decimal product `N * S`
//! sprinkled with `S` spaces and some random noise characters.  The server
//! recovers each `N` by reading only the digits and dividing by the number of
//! spaces.  After the headers the client sends 8 raw bytes (`key3`), and the
//! server answers with
//!
//! ```text
//! MD5( BE32(N1) ++ BE32(N2) ++ key3 )
//! ```
//!
//! as 16 raw bytes following its own response headers.

use std::collections::HashMap;

use md5::{Digest, Md5};
use rand::Rng;
use tracing::debug;

use crate::handshake::error::HandshakeError;
use crate::handshake::headers::Headers;
use crate::handshake::request::UpgradeRequest;
use crate::handshake::write_header;

/// Length of the `key3` challenge the client sends after its headers.
pub const CHALLENGE_LEN: usize = 8;

/// Length of the MD5 digest the server sends after its headers.
pub const DIGEST_LEN: usize = 16;

/// Most spaces (and most noise characters) a generated key carries.
const MAX_KEY_SPACES: u32 = 12;
const MAX_KEY_NOISE: usize = 12;

/// Headers the client request writes itself; caller copies are skipped.
const RESERVED_CLIENT_HEADERS: [&str; 5] = [
    "Upgrade",
    "Connection",
    "Content-Length",
    "Sec-WebSocket-Key1",
    "Sec-WebSocket-Key2",
];

// ── Keys ──────────────────────────────────────────────────────────────────────

/// A generated client key together with the number it encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyKey {
    /// Header value, e.g. `"4 @1  46546xW%0l 1 5"`.
    pub key: String,
    /// `N`, the value the server recovers by division.
    pub number: u32,
    /// `S`, the number of spaces in `key`.
    pub spaces: u32,
}

/// Generates a key header value from `rng`.
///
/// The product `N * S` always fits a `u32`, no noise character is a digit or
/// a space, and no space lands at either end of the value.
pub fn generate_key<R: Rng>(rng: &mut R) -> LegacyKey {
    let spaces = rng.random_range(1..=MAX_KEY_SPACES);
    let number = rng.random_range(1..=u32::MAX / spaces);
    let mut key = (number * spaces).to_string().into_bytes();

    let noise = rng.random_range(1..=MAX_KEY_NOISE);
    for _ in 0..noise {
        let position = rng.random_range(0..=key.len());
        let ch = if rng.random_bool(0.5) {
            rng.random_range(0x21..=0x2Fu8)
        } else {
            rng.random_range(0x3A..=0x7Eu8)
        };
        key.insert(position, ch);
    }

    for _ in 0..spaces {
        let position = rng.random_range(1..key.len());
        key.insert(position, b' ');
    }

    LegacyKey {
        // Every inserted byte is printable ASCII.
        key: key.into_iter().map(char::from).collect(),
        number,
        spaces,
    }
}

/// The raw numbers a server reads out of one key header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNumbers {
    /// The key's digits read as one decimal number.
    pub value: u32,
    /// The key's space count, always at least 1.
    pub spaces: u32,
}

impl KeyNumbers {
    /// `value / spaces`, truncating.
    ///
    /// Keys whose value is not an exact multiple of the space count are
    /// accepted; the remainder is dropped.
    pub fn quotient(&self) -> u32 {
        self.value / self.spaces
    }
}

/// Reads the digits and spaces of a key header.
///
/// # Errors
///
/// [`HandshakeError::InvalidLegacyKey`] when the key has no digits, its digits
/// overflow a `u32`, it has no spaces, or its value is zero.
pub fn parse_key(key: &str, header: &'static str) -> Result<KeyNumbers, HandshakeError> {
    let invalid = |reason| HandshakeError::InvalidLegacyKey { header, reason };

    let digits: String = key.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(invalid("no digits"));
    }
    let value: u32 = digits.parse().map_err(|_| invalid("number exceeds 32 bits"))?;
    if value == 0 {
        return Err(invalid("number is zero"));
    }

    let spaces = key.bytes().filter(|&b| b == b' ').count();
    if spaces == 0 {
        return Err(invalid("no spaces"));
    }

    Ok(KeyNumbers {
        value,
        spaces: u32::try_from(spaces).unwrap_or(u32::MAX),
    })
}

// ── Challenge ─────────────────────────────────────────────────────────────────

/// Generates the 8 random `key3` bytes a client sends after its headers.
pub fn generate_challenge<R: Rng>(rng: &mut R) -> [u8; CHALLENGE_LEN] {
    rng.random::<u64>().to_be_bytes()
}

/// `MD5(BE32(n1) ++ BE32(n2) ++ key3)`.
///
/// Client and server both call this, so identical inputs always produce
/// identical digests on both sides.
pub fn compute_challenge_response(
    n1: u32,
    n2: u32,
    key3: &[u8; CHALLENGE_LEN],
) -> [u8; DIGEST_LEN] {
    let mut hasher = Md5::new();
    hasher.update(n1.to_be_bytes());
    hasher.update(n2.to_be_bytes());
    hasher.update(key3);
    hasher.finalize().into()
}

/// Computes the digest a server owes the client for these key headers.
///
/// # Errors
///
/// Propagates [`parse_key`] failures for either header.
pub fn server_digest(
    key1: &str,
    key2: &str,
    challenge: &[u8; CHALLENGE_LEN],
) -> Result<[u8; DIGEST_LEN], HandshakeError> {
    let n1 = parse_key(key1, "Sec-WebSocket-Key1")?;
    let n2 = parse_key(key2, "Sec-WebSocket-Key2")?;
    Ok(compute_challenge_response(n1.quotient(), n2.quotient(), challenge))
}

// ── Server side ───────────────────────────────────────────────────────────────

/// Checks the headers of a legacy upgrade request.
///
/// The key values themselves are only parsed when the digest is computed,
/// after the challenge bytes have been read.
///
/// # Errors
///
/// The first failed check: `Upgrade` must be "websocket" and `Connection`
/// "upgrade" (both ignoring case), and both key headers must be non-empty.
pub fn validate_legacy_request(request: &UpgradeRequest) -> Result<(), HandshakeError> {
    let headers = &request.headers;

    let upgrade = headers.get("Upgrade");
    if !upgrade.is_some_and(|v| v.eq_ignore_ascii_case("websocket")) {
        return Err(reject(HandshakeError::InvalidUpgradeHeader(upgrade.map(str::to_string))));
    }

    let connection = headers.get("Connection");
    if !connection.is_some_and(|v| v.eq_ignore_ascii_case("upgrade")) {
        return Err(reject(HandshakeError::InvalidConnectionHeader(
            connection.map(str::to_string),
        )));
    }

    for header in ["Sec-WebSocket-Key1", "Sec-WebSocket-Key2"] {
        if headers.get_or_empty(header).is_empty() {
            return Err(reject(HandshakeError::InvalidLegacyKey {
                header,
                reason: "missing or empty",
            }));
        }
    }
    Ok(())
}

fn reject(error: HandshakeError) -> HandshakeError {
    debug!("rejecting v0 upgrade: {error}");
    error
}

/// The `Sec-WebSocket-Location` a server bound to `local_host` reports.
pub fn location(local_host: &str, path: &str) -> String {
    format!("ws://{local_host}{path}")
}

/// Renders the `101` response head followed by the 16-byte digest.
pub fn server_response_bytes(
    request: &UpgradeRequest,
    location: &str,
    digest: &[u8; DIGEST_LEN],
) -> Vec<u8> {
    let headers = &request.headers;
    let mut buf = Vec::with_capacity(192);
    buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    write_header(&mut buf, "Upgrade", "WebSocket");
    write_header(&mut buf, "Connection", "Upgrade");
    let protocol = headers.get_or_empty("Sec-WebSocket-Protocol");
    if !protocol.is_empty() {
        write_header(&mut buf, "Sec-WebSocket-Protocol", protocol);
    }
    write_header(&mut buf, "Sec-WebSocket-Location", location);
    write_header(&mut buf, "Sec-WebSocket-Origin", headers.get_or_empty("Origin"));
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(digest);
    buf
}

// ── Client side ───────────────────────────────────────────────────────────────

/// Renders a client request: head, blank line, then `key3` with no delimiter.
///
/// `headers` should carry `Host` and `Origin`, plus `Sec-WebSocket-Protocol`
/// when a subprotocol is wanted.  Copies of the headers this function writes
/// itself are skipped.
pub fn client_request_bytes(
    path: &str,
    key1: &str,
    key2: &str,
    headers: &Headers,
    key3: &[u8; CHALLENGE_LEN],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(format!("GET {path} HTTP/1.1\r\n").as_bytes());
    write_header(&mut buf, "Upgrade", "WebSocket");
    write_header(&mut buf, "Connection", "Upgrade");
    write_header(&mut buf, "Content-Length", "8");
    write_header(&mut buf, "Sec-WebSocket-Key1", key1);
    write_header(&mut buf, "Sec-WebSocket-Key2", key2);
    for (name, value) in headers.iter() {
        if RESERVED_CLIENT_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            continue;
        }
        write_header(&mut buf, name, value);
    }
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(key3);
    buf
}

/// A parsed server response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyResponseHead {
    /// Header values keyed by lowercased name; a repeated name keeps the last
    /// value.
    pub fields: HashMap<String, String>,
    /// Bytes consumed, up to and including the blank line.
    pub consumed: usize,
}

/// Checks a status line, including its trailing CRLF.
///
/// # Errors
///
/// [`HandshakeError::MalformedResponse`] when the line is shorter than 7
/// bytes, lacks the CRLF, or has fewer than two spaces;
/// [`HandshakeError::UnexpectedStatus`] when the code is not "101".
pub fn validate_status_line(line: &[u8]) -> Result<(), HandshakeError> {
    let spaces = line.iter().filter(|&&b| b == b' ').count();
    if line.len() < 7 || !line.ends_with(b"\r\n") || spaces < 2 {
        return Err(HandshakeError::MalformedResponse(format!(
            "bad status line {:?}",
            String::from_utf8_lossy(line)
        )));
    }
    let code = line.split(|&b| b == b' ').nth(1).unwrap_or_default();
    if code != b"101" {
        return Err(HandshakeError::UnexpectedStatus(
            String::from_utf8_lossy(code).into_owned(),
        ));
    }
    Ok(())
}

/// Parses a response head from the start of `buf`.
///
/// Returns `Ok(None)` when `buf` ends before the blank line; the caller reads
/// more bytes and tries again.  Bytes after the head (the digest) are left
/// unconsumed.
///
/// # Errors
///
/// A bad status line (see [`validate_status_line`]), a CR or LF inside a
/// header name, an LF inside a value, or a CR not followed by LF.
pub fn parse_response_head(buf: &[u8]) -> Result<Option<LegacyResponseHead>, HandshakeError> {
    let Some(line_end) = buf.iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    validate_status_line(&buf[..=line_end])?;

    let mut pos = line_end + 1;
    let mut fields = HashMap::new();
    loop {
        // Name: lowercased, ends at ':'; a CR before any name byte ends the head.
        let mut name = Vec::new();
        loop {
            let Some(&b) = buf.get(pos) else { return Ok(None) };
            pos += 1;
            match b {
                b'\r' if name.is_empty() => {
                    return match buf.get(pos) {
                        None => Ok(None),
                        Some(b'\n') => Ok(Some(LegacyResponseHead {
                            fields,
                            consumed: pos + 1,
                        })),
                        Some(_) => Err(malformed("CR without LF after headers")),
                    };
                }
                b'\r' | b'\n' => return Err(malformed("line break inside header name")),
                b':' => break,
                _ => name.push(b.to_ascii_lowercase()),
            }
        }

        // Value: one leading space skipped, ends at CR.
        let mut value = Vec::new();
        let mut first = true;
        loop {
            let Some(&b) = buf.get(pos) else { return Ok(None) };
            pos += 1;
            match b {
                b' ' if first => {}
                b'\r' => break,
                b'\n' => return Err(malformed("LF inside header value")),
                _ => value.push(b),
            }
            first = false;
        }
        match buf.get(pos) {
            None => return Ok(None),
            Some(b'\n') => pos += 1,
            Some(_) => return Err(malformed("CR without LF after header value")),
        }

        fields.insert(
            String::from_utf8_lossy(&name).into_owned(),
            String::from_utf8_lossy(&value).into_owned(),
        );
    }
}

fn malformed(reason: &str) -> HandshakeError {
    HandshakeError::MalformedResponse(reason.to_string())
}

/// Checks response fields against the request that was sent.
///
/// # Errors
///
/// A header with an empty name, a missing required header, a subprotocol that
/// differs from (or is missing for) the requested one, or a wrong `Upgrade`,
/// `Connection` or `Sec-WebSocket-Origin` value.
pub fn validate_response_fields(
    fields: &HashMap<String, String>,
    request_headers: &Headers,
) -> Result<(), HandshakeError> {
    if fields.contains_key("") {
        return Err(malformed("header with empty name"));
    }

    for (key, header) in [
        ("upgrade", "Upgrade"),
        ("connection", "Connection"),
        ("sec-websocket-origin", "Sec-WebSocket-Origin"),
        ("sec-websocket-location", "Sec-WebSocket-Location"),
    ] {
        if !fields.contains_key(key) {
            return Err(HandshakeError::MissingHeader(header));
        }
    }

    let requested = request_headers.get_or_empty("Sec-WebSocket-Protocol");
    match fields.get("sec-websocket-protocol") {
        Some(echoed) if echoed != requested => {
            return Err(mismatch("Sec-WebSocket-Protocol", requested, echoed));
        }
        None if !requested.is_empty() => {
            return Err(HandshakeError::MissingHeader("Sec-WebSocket-Protocol"));
        }
        _ => {}
    }

    let upgrade = &fields["upgrade"];
    if upgrade != "WebSocket" {
        return Err(mismatch("Upgrade", "WebSocket", upgrade));
    }
    let connection = &fields["connection"];
    if !connection.eq_ignore_ascii_case("upgrade") {
        return Err(mismatch("Connection", "Upgrade", connection));
    }
    let origin = &fields["sec-websocket-origin"];
    let expected_origin = request_headers.get_or_empty("Origin");
    if origin != expected_origin {
        return Err(mismatch("Sec-WebSocket-Origin", expected_origin, origin));
    }
    Ok(())
}

fn mismatch(header: &'static str, expected: &str, actual: &str) -> HandshakeError {
    HandshakeError::HeaderMismatch {
        header,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Compares the server's 16-byte reply with the digest we expect.
///
/// # Errors
///
/// [`HandshakeError::ChallengeMismatch`] carrying both digests.
pub fn verify_challenge_reply(
    expected: &[u8; DIGEST_LEN],
    actual: &[u8; DIGEST_LEN],
) -> Result<(), HandshakeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(HandshakeError::ChallengeMismatch {
            expected: *expected,
            actual: *actual,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
