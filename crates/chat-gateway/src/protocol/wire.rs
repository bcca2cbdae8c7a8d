//! Field-level encoding
//!
//! Integers are big-endian, byte strings are either `u32`-length-prefixed
//! or run to the end of the payload when they are the last field.

use bytes::{Buf, BufMut, Bytes};
use thiserror::Error;

/// A payload that does not match the message layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Message truncated while reading {0}")]
    Truncated(&'static str),

    #[error("Unknown message type {0}")]
    UnknownTag(u32),

    #[error("Unknown command {0}")]
    UnknownCommand(u32),

    #[error("Unknown entry type {0}")]
    UnknownEntryType(u32),

    #[error("Unknown credential kind {0}")]
    UnknownCredentialKind(u32),

    #[error("Unknown action {0}")]
    UnknownAction(u32),

    #[error("Unknown content type {0}")]
    UnknownContentType(u32),

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Cursor over one inbound payload
#[derive(Debug)]
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, n: usize, field: &'static str) -> ProtocolResult<()> {
        if self.buf.len() < n {
            return Err(ProtocolError::Truncated(field));
        }
        Ok(())
    }

    pub fn u8(&mut self, field: &'static str) -> ProtocolResult<u8> {
        self.need(1, field)?;
        Ok(self.buf.get_u8())
    }

    pub fn bool(&mut self, field: &'static str) -> ProtocolResult<bool> {
        Ok(self.u8(field)? != 0)
    }

    pub fn u32(&mut self, field: &'static str) -> ProtocolResult<u32> {
        self.need(4, field)?;
        Ok(self.buf.get_u32())
    }

    pub fn i32(&mut self, field: &'static str) -> ProtocolResult<i32> {
        self.need(4, field)?;
        Ok(self.buf.get_i32())
    }

    pub fn i64(&mut self, field: &'static str) -> ProtocolResult<i64> {
        self.need(8, field)?;
        Ok(self.buf.get_i64())
    }

    /// `[u32 len][bytes]`
    pub fn lp_bytes(&mut self, field: &'static str) -> ProtocolResult<Bytes> {
        let len = self.u32(field)? as usize;
        self.need(len, field)?;
        Ok(self.buf.split_to(len))
    }

    pub fn lp_string(&mut self, field: &'static str) -> ProtocolResult<String> {
        let bytes = self.lp_bytes(field)?;
        utf8(bytes, field)
    }

    /// Everything left in the payload
    pub fn rest(&mut self) -> Bytes {
        self.buf.split_off(0)
    }

    pub fn rest_string(&mut self, field: &'static str) -> ProtocolResult<String> {
        let bytes = self.rest();
        utf8(bytes, field)
    }
}

fn utf8(bytes: Bytes, field: &'static str) -> ProtocolResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(field))
}

/// Append `[u32 len][bytes]`
pub fn put_lp(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Append a `u32` count followed by `i32` items
pub fn put_i32_list(buf: &mut impl BufMut, items: impl ExactSizeIterator<Item = i32>) {
    buf.put_u32(items.len() as u32);
    for item in items {
        buf.put_i32(item);
    }
}

pub fn i32_list(reader: &mut PayloadReader, field: &'static str) -> ProtocolResult<Vec<i32>> {
    let n = reader.u32(field)? as usize;
    // Each item needs four bytes, so a bogus count cannot force a large allocation
    if reader.remaining() < n.saturating_mul(4) {
        return Err(ProtocolError::Truncated(field));
    }
    (0..n).map(|_| reader.i32(field)).collect()
}
