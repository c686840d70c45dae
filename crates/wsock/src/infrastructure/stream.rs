//! Buffered duplex byte stream.
//!
//! # Why a buffer is needed (for beginners)
//!
//! TCP is a stream protocol.  One `read()` may return half a frame, or the
//! end of one frame plus the start of the next.  [`ByteStream`] keeps every
//! byte it has read but nobody has consumed yet, so the decoders can be
//! retried on the growing buffer until a whole frame is there:
//!
//! ```text
//! loop {
//!     match decode(stream.buffer()) {
//!         Ok((frame, used)) => { stream.consume(used); return frame }
//!         Err(truncated)    => stream.fill().await?,   // read more, retry
//!     }
//! }
//! ```
//!
//! The same buffer carries bytes across the HTTP/WebSocket boundary: anything
//! read past the end of the request head (the v0 challenge, or an eager first
//! frame) stays buffered for the handshake and the connection.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::config::DEFAULT_READ_BUFFER_SIZE;

/// A duplex stream plus the bytes read from it but not yet consumed.
#[derive(Debug)]
pub struct ByteStream<S> {
    inner: S,
    buf: Vec<u8>,
    scratch: Vec<u8>,
}

impl<S> ByteStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Wraps `inner`, reading at most `read_size` bytes per call.
    pub fn with_capacity(inner: S, read_size: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(read_size),
            scratch: vec![0; read_size.max(1)],
        }
    }

    /// Wraps a stream whose owner already read `buffered` from it.
    ///
    /// Those bytes are served before anything new is read.
    pub fn with_buffered(inner: S, buffered: Vec<u8>, read_size: usize) -> Self {
        let mut stream = Self::with_capacity(inner, read_size);
        stream.buf = buffered;
        stream
    }

    /// Bytes read but not yet consumed.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Drops the first `n` buffered bytes.
    pub fn consume(&mut self, n: usize) {
        self.buf.drain(..n.min(self.buf.len()));
    }

    /// Reads once from the stream and appends to the buffer.
    ///
    /// Returns the number of new bytes; 0 means end of stream.
    pub async fn fill(&mut self) -> io::Result<usize> {
        let n = self.inner.read(&mut self.scratch).await?;
        self.buf.extend_from_slice(&self.scratch[..n]);
        Ok(n)
    }

    /// Reads until at least `n` bytes are buffered.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the stream ends first.
    pub async fn fill_to(&mut self, n: usize) -> io::Result<()> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended after {} of {n} bytes", self.buf.len()),
                ));
            }
        }
        Ok(())
    }

    /// Reads and consumes one byte.
    pub async fn read_byte(&mut self) -> io::Result<u8> {
        self.fill_to(1).await?;
        let byte = self.buf[0];
        self.consume(1);
        Ok(byte)
    }

    /// Reads and consumes exactly `N` bytes.
    pub async fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        self.fill_to(N).await?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[..N]);
        self.consume(N);
        Ok(out)
    }

    /// Writes all of `bytes` and flushes.
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Returns the stream and any unconsumed bytes.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.inner, self.buf)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
