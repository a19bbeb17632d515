//! Incremental frame decoder for the length-prefixed clip stream.
//!
//! The inbound wire format is a single continuous byte stream, chunked
//! arbitrarily by the transport:
//!
//! ```text
//! [u32 LE length][length bytes of WAV container] ...
//! ```
//!
//! optionally interspersed with zero-length sentinel frames, terminated by
//! the transport closing the stream (no in-band end marker).
//!
//! The decoder owns an append-only byte cursor. Bytes are only ever consumed
//! whole-frame from the front, strictly FIFO:
//! - fewer than 4 bytes buffered: wait (a prefix split across chunks is
//!   buffered until all 4 bytes are present, never re-sliced),
//! - `length == 0`: drop the 4-byte prefix and keep scanning (flush sentinel,
//!   no clip is produced),
//! - fewer than `4 + length` bytes buffered: wait without consuming the
//!   prefix, so the same length is re-read once more data arrives,
//! - otherwise: emit the payload and advance past `4 + length`.

use bytes::{Bytes, BytesMut};

use crate::error::{SessionError, SessionResult};

/// Size of the little-endian length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Reassembles complete clip payloads from arbitrarily chunked bytes.
#[derive(Debug)]
pub struct FrameDecoder {
    cursor: BytesMut,
    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// Create a decoder. `max_frame_bytes` bounds a single payload; a length
    /// prefix above it is treated as stream corruption.
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            cursor: BytesMut::new(),
            max_frame_bytes,
        }
    }

    /// Append newly received bytes and extract every frame that is now
    /// complete, in stream order.
    ///
    /// The output is invariant under how the input was chunked: feeding a
    /// stream one byte at a time yields the same payload sequence as feeding
    /// it whole.
    pub fn feed(&mut self, chunk: &[u8]) -> SessionResult<Vec<Bytes>> {
        self.cursor.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            if self.cursor.len() < LENGTH_PREFIX_BYTES {
                break;
            }

            let len = u32::from_le_bytes(
                self.cursor[..LENGTH_PREFIX_BYTES]
                    .try_into()
                    .expect("prefix slice is 4 bytes"),
            ) as usize;

            if len == 0 {
                // Flush sentinel: consume the prefix, produce nothing.
                let _ = self.cursor.split_to(LENGTH_PREFIX_BYTES);
                continue;
            }

            if len > self.max_frame_bytes {
                return Err(SessionError::StreamCorruption(format!(
                    "frame length {len} exceeds limit {}",
                    self.max_frame_bytes
                )));
            }

            if self.cursor.len() < LENGTH_PREFIX_BYTES + len {
                // Partial frame: leave the prefix in place and wait.
                break;
            }

            let _ = self.cursor.split_to(LENGTH_PREFIX_BYTES);
            frames.push(self.cursor.split_to(len).freeze());
        }

        Ok(frames)
    }

    /// Validate end-of-stream: any leftover bytes are undecodable trailing
    /// data and mean the stream was truncated or corrupt.
    pub fn finish(&self) -> SessionResult<()> {
        if self.cursor.is_empty() {
            Ok(())
        } else {
            Err(SessionError::StreamCorruption(format!(
                "{} trailing bytes after end of stream",
                self.cursor.len()
            )))
        }
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.cursor.len()
    }
}
