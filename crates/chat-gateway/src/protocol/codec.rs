//! Length-prefixed framing
//!
//! Every frame is a big-endian `u32` length followed by that many payload
//! bytes. Large outgoing payloads are zstd-compressed; incoming payloads that
//! start with the zstd magic number are decompressed before they are handed on.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Size of the length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Leading bytes of every zstd frame
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const COMPRESSION_LEVEL: i32 = 3;

/// Recoverable problems with a single inbound frame.
///
/// The stream stays in sync after either of these, so the connection is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Compressed frame could not be decoded: {0}")]
    DecompressionFailed(String),
}

/// Codec for `[u32 length][payload]` frames.
///
/// The maximum inbound length follows the connection's protocol stage and
/// is checked before any space is reserved for the payload.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_len: usize,
    /// Bytes of an oversized frame still to be skipped
    discarding: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            discarding: 0,
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn set_max_frame_len(&mut self, max_frame_len: usize) {
        self.max_frame_len = max_frame_len;
    }

    fn skip(&mut self, src: &mut BytesMut) {
        let n = self.discarding.min(src.len());
        src.advance(n);
        self.discarding -= n;
    }
}

impl Decoder for FrameCodec {
    type Item = Result<Bytes, FrameError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.discarding > 0 {
            self.skip(src);
            if self.discarding > 0 {
                return Ok(None);
            }
        }

        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > self.max_frame_len {
            src.advance(LENGTH_PREFIX_LEN);
            self.discarding = len;
            self.skip(src);
            return Ok(Some(Err(FrameError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            })));
        }

        let total = LENGTH_PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let payload = src.split_to(len).freeze();

        if payload.starts_with(&ZSTD_MAGIC) {
            return Ok(Some(
                zstd::bulk::decompress(&payload, self.max_frame_len)
                    .map(Bytes::from)
                    .map_err(|e| FrameError::DecompressionFailed(e.to_string())),
            ));
        }

        Ok(Some(Ok(payload)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("payload of {} bytes cannot be framed", payload.len()),
            )
        })?;

        dst.reserve(LENGTH_PREFIX_LEN + payload.len());
        dst.put_u32(len);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// Freeze a serialized payload for sending, compressing it at or above `threshold`.
///
/// Broadcasts call this once and clone the result for every recipient.
pub fn prepare_payload(payload: BytesMut, threshold: usize) -> Bytes {
    if payload.len() < threshold {
        return payload.freeze();
    }

    match zstd::bulk::compress(&payload, COMPRESSION_LEVEL) {
        Ok(compressed) => Bytes::from(compressed),
        Err(e) => {
            warn!(error = %e, size = payload.len(), "Compression failed, sending uncompressed");
            payload.freeze()
        }
    }
}
