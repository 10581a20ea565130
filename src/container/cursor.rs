//! Bounds-checked cursors over container bytes.
//!
//! Every field read validates the remaining length first; reading past the
//! end of the buffer is a [`Error::TruncatedBuffer`], never a panic.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Read cursor over a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Cursor positioned at `offset`. The offset itself is only checked on
    /// the first read.
    pub fn at(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, pos: offset }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.bytes(n).map(|_| ())
    }

    /// Borrows the next `n` bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available || self.pos > self.buf.len() {
            return Err(Error::TruncatedBuffer {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        self.bytes(2).map(LittleEndian::read_u16)
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        self.bytes(4).map(LittleEndian::read_u32)
    }

    pub fn i32_le(&mut self) -> Result<i32> {
        self.bytes(4).map(LittleEndian::read_i32)
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        self.bytes(4).map(BigEndian::read_u32)
    }

    pub fn i32_be(&mut self) -> Result<i32> {
        self.bytes(4).map(BigEndian::read_i32)
    }

    pub fn u64_le(&mut self) -> Result<u64> {
        self.bytes(8).map(LittleEndian::read_u64)
    }

    /// Reads a chunk ID and fails with [`Error::MagicMismatch`] unless it is
    /// `expected`.
    pub fn expect_u32_le(&mut self, expected: u32) -> Result<()> {
        let offset = self.pos;
        let found = self.u32_le()?;
        if found != expected {
            return Err(Error::MagicMismatch {
                offset,
                expected,
                found,
            });
        }
        Ok(())
    }
}

/// Little-endian fixed-offset field access used by the sniffer, where each
/// dialect probes a handful of absolute offsets.
pub fn u32_le_at(buf: &[u8], offset: usize) -> Result<u32> {
    Reader::at(buf, offset).u32_le()
}

pub fn i32_le_at(buf: &[u8], offset: usize) -> Result<i32> {
    Reader::at(buf, offset).i32_le()
}

pub fn u32_be_at(buf: &[u8], offset: usize) -> Result<u32> {
    Reader::at(buf, offset).u32_be()
}

pub fn i32_be_at(buf: &[u8], offset: usize) -> Result<i32> {
    Reader::at(buf, offset).i32_be()
}

pub fn u8_at(buf: &[u8], offset: usize) -> Result<u8> {
    Reader::at(buf, offset).u8()
}

/// Append-only writer producing an owned buffer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u16_le(&mut self, value: u16) {
        let mut raw = [0u8; 2];
        LittleEndian::write_u16(&mut raw, value);
        self.bytes(&raw);
    }

    pub fn u32_le(&mut self, value: u32) {
        let mut raw = [0u8; 4];
        LittleEndian::write_u32(&mut raw, value);
        self.bytes(&raw);
    }

    pub fn u32_be(&mut self, value: u32) {
        let mut raw = [0u8; 4];
        BigEndian::write_u32(&mut raw, value);
        self.bytes(&raw);
    }

    pub fn u64_le(&mut self, value: u64) {
        let mut raw = [0u8; 8];
        LittleEndian::write_u64(&mut raw, value);
        self.bytes(&raw);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
