//! Handshake primitives for both protocol eras.
//!
//! Everything in this module is pure: it validates header sets, computes
//! digests, generates keys from a caller-supplied random source, and renders
//! request/response bytes.  Driving these steps over a live stream is the job
//! of the `wsock` crate.

pub mod error;
pub mod headers;
pub mod legacy;
pub mod request;
pub mod standard;

pub use error::HandshakeError;
pub use headers::Headers;
pub use request::UpgradeRequest;

/// Renders an HTTP/1.1 status line plus headers and the blank line.
pub(crate) fn write_head(buf: &mut Vec<u8>, status: u16, reason: &str, headers: &[(&str, &str)]) {
    buf.extend_from_slice(format!("HTTP/1.1 {status} {reason}\r\n").as_bytes());
    for (name, value) in headers {
        write_header(buf, name, value);
    }
    buf.extend_from_slice(b"\r\n");
}

pub(crate) fn write_header(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}

/// Returns the response bytes a server sends when it rejects a handshake.
///
/// The status comes from [`HandshakeError::status`]; a version rejection also
/// advertises the supported version.
pub fn rejection_response(error: &HandshakeError) -> Vec<u8> {
    let status = error.status();
    let reason = match status {
        426 => "Upgrade Required",
        _ => "Bad Request",
    };
    let mut buf = Vec::with_capacity(64);
    if matches!(error, HandshakeError::UnsupportedVersion(_)) {
        write_head(
            &mut buf,
            status,
            reason,
            &[("Sec-WebSocket-Version", standard::SUPPORTED_VERSION)],
        );
    } else {
        write_head(&mut buf, status, reason, &[]);
    }
    buf
}

/// Renders a bare response with no headers, e.g. a 404 for an unknown path.
pub fn status_response(status: u16, reason: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(48);
    write_head(&mut buf, status, reason, &[]);
    buf
}
