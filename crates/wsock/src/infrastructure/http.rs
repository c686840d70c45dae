//! Minimal HTTP/1.1 head reader.
//!
//! Stands in for a full HTTP server: it reads a request (or response) head up
//! to the blank line with `httparse` and leaves every byte after it in the
//! [`ByteStream`] buffer.  For a Hixie-76 request those bytes are the 8-byte
//! challenge, which the handshake reads next.

use tokio::io::{AsyncRead, AsyncWrite};
use wsock_core::{HandshakeError, Headers, UpgradeRequest};

use crate::error::WsError;
use crate::infrastructure::stream::ByteStream;

/// Largest request or response head accepted, in bytes.
pub const MAX_HEAD_LEN: usize = 8 * 1024;

/// Most header lines accepted in one head.
pub const MAX_HEADERS: usize = 64;

/// A parsed response status line plus headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Headers,
}

/// Parses a request head from the start of `buf`.
///
/// Returns `Ok(None)` while the blank line has not arrived yet.
///
/// # Errors
///
/// [`HandshakeError::MalformedRequest`] for anything `httparse` rejects.
pub fn parse_request_head(buf: &[u8]) -> Result<Option<(UpgradeRequest, usize)>, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            let request = UpgradeRequest::new(
                req.method.unwrap_or_default(),
                req.path.unwrap_or_default(),
                collect_headers(req.headers),
            );
            Ok(Some((request, len)))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(HandshakeError::MalformedRequest(e.to_string())),
    }
}

/// Parses a response head from the start of `buf`.
///
/// # Errors
///
/// [`HandshakeError::MalformedResponse`] for anything `httparse` rejects.
pub fn parse_response_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut headers);
    match res.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            let head = ResponseHead {
                status: res.code.unwrap_or_default(),
                headers: collect_headers(res.headers),
            };
            Ok(Some((head, len)))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(HandshakeError::MalformedResponse(e.to_string())),
    }
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> Headers {
    raw.iter()
        .map(|h| (h.name, String::from_utf8_lossy(h.value).into_owned()))
        .collect()
}

/// Reads one request head from `stream`.
///
/// # Errors
///
/// - [`WsError::HandshakeRejected`] if the head is malformed or longer than
///   [`MAX_HEAD_LEN`].
/// - [`WsError::Transport`] if the stream fails or ends before the blank line.
pub async fn read_request<S>(stream: &mut ByteStream<S>) -> Result<UpgradeRequest, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    read_head(stream, parse_request_head, |len| {
        HandshakeError::MalformedRequest(format!("request head exceeds {len} bytes"))
    })
    .await
}

/// Reads one response head from `stream`.
///
/// # Errors
///
/// As for [`read_request`], with [`HandshakeError::MalformedResponse`].
pub async fn read_response<S>(stream: &mut ByteStream<S>) -> Result<ResponseHead, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    read_head(stream, parse_response_head, |len| {
        HandshakeError::MalformedResponse(format!("response head exceeds {len} bytes"))
    })
    .await
}

async fn read_head<S, T>(
    stream: &mut ByteStream<S>,
    parse: fn(&[u8]) -> Result<Option<(T, usize)>, HandshakeError>,
    too_long: fn(usize) -> HandshakeError,
) -> Result<T, WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    loop {
        if let Some((head, len)) = parse(stream.buffer())? {
            stream.consume(len);
            return Ok(head);
        }
        if stream.buffer().len() > MAX_HEAD_LEN {
            return Err(too_long(MAX_HEAD_LEN).into());
        }
        if stream.fill().await? == 0 {
            return Err(WsError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended inside the HTTP head",
            )));
        }
    }
}

/// Writes a bare status response (e.g. 404) and shuts the stream down.
///
/// # Errors
///
/// [`WsError::Transport`] if the write fails.
pub async fn respond_status<S>(
    stream: &mut ByteStream<S>,
    status: u16,
    reason: &str,
) -> Result<(), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    stream
        .write_all(&wsock_core::handshake::status_response(status, reason))
        .await?;
    stream.shutdown().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_parse_request_head_keeps_body_unconsumed() {
        let raw = b"GET /ws HTTP/1.1\r\nHost: a\r\nSec-WebSocket-Key1: 1 2\r\n\r\nABCDEFGH";

        let (request, len) = parse_request_head(raw).unwrap().unwrap();

        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/ws");
        assert_eq!(request.host(), Some("a"));
        assert!(request.is_legacy());
        assert_eq!(&raw[len..], b"ABCDEFGH");
    }

    #[test]
    fn test_partial_request_head_is_none() {
        assert_eq!(parse_request_head(b"GET /ws HTTP/1.1\r\nHost: a\r\n"), Ok(None));
    }

    #[test]
    fn test_garbage_request_is_malformed() {
        assert!(matches!(
            parse_request_head(b"\x01\x02 nonsense\r\n\r\n"),
            Err(HandshakeError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_parse_response_head() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n\x81\x00";

        let (head, len) = parse_response_head(raw).unwrap().unwrap();

        assert_eq!(head.status, 101);
        assert_eq!(head.headers.get("upgrade"), Some("websocket"));
        assert_eq!(&raw[len..], b"\x81\x00");
    }

    #[tokio::test]
    async fn test_read_request_across_several_reads() {
        // Arrange: the head arrives split, followed by the first body bytes.
        let mock = Builder::new()
            .read(b"GET /chat HTTP/1.1\r\nHo")
            .read(b"st: example.com\r\n\r\nxy")
            .build();
        let mut stream = ByteStream::new(mock);

        // Act
        let request = read_request(&mut stream).await.unwrap();

        // Assert
        assert_eq!(request.path, "/chat");
        assert_eq!(request.host(), Some("example.com"));
        assert_eq!(stream.buffer(), b"xy");
    }

    #[tokio::test]
    async fn test_read_request_eof_is_transport_error() {
        let mock = Builder::new().read(b"GET / HTTP/1.1\r\n").build();
        let mut stream = ByteStream::new(mock);

        let err = read_request(&mut stream).await.unwrap_err();

        assert!(matches!(err, WsError::Transport(_)));
    }

    #[tokio::test]
    async fn test_oversized_head_is_rejected() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_HEAD_LEN + 10));
        let mock = Builder::new().read(&raw).build();
        let mut stream = ByteStream::with_capacity(mock, raw.len());

        let err = read_request(&mut stream).await.unwrap_err();

        assert!(matches!(
            err,
            WsError::HandshakeRejected(HandshakeError::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_respond_status_writes_404() {
        let mock = Builder::new().write(b"HTTP/1.1 404 Not Found\r\n\r\n").build();
        let mut stream = ByteStream::new(mock);

        respond_status(&mut stream, 404, "Not Found").await.unwrap();
    }
}
