//! Bounds-checked reading over a byte slice.
//!
//! Every frame parser in this crate reads through a [`ByteCursor`] instead of
//! indexing the buffer directly.  A read past the end never panics: it returns
//! [`ProtocolError::TruncatedFrame`] with the number of bytes that would have
//! been needed, which is exactly what a stream reader needs to know to decide
//! whether to wait for more data.

use crate::protocol::error::ProtocolError;

/// A forward-only reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor positioned at the first byte of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedFrame`] if the cursor is at the end.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let bytes = self.take(1)?;
        Ok(bytes[0])
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16_be(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Reads a big-endian `u64`.
    pub fn read_u64_be(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Reads exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Borrows the next `len` bytes and advances past them.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TruncatedFrame`] if fewer than `len` bytes
    /// remain.  `needed` is reported relative to the start of the buffer.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| ProtocolError::MalformedFrame(format!("length {len} overflows")))?;
        if end > self.buf.len() {
            return Err(ProtocolError::TruncatedFrame {
                needed: end,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Returns the offset (relative to the current position) of the first
    /// occurrence of `byte`, without consuming anything.
    pub fn find(&self, byte: u8) -> Option<usize> {
        self.find_from(byte, 0)
    }

    /// Like [`ByteCursor::find`], but skips the first `skip` bytes after the
    /// current position.  The returned offset is still relative to the
    /// current position.
    pub fn find_from(&self, byte: u8, skip: usize) -> Option<usize> {
        let start = self.pos.saturating_add(skip).min(self.buf.len());
        self.buf[start..]
            .iter()
            .position(|&b| b == byte)
            .map(|i| start - self.pos + i)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
