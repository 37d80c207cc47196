//! Line framing for chat connections.
//!
//! TCP delivers an unframed byte stream: one read may hold half a line,
//! or several lines fused together. `LineCodec` buffers across reads and
//! yields exactly one item per `\n`-terminated line, in order.
//!
//! ```text
//!  read #1: "Line1\nLi"   ──▶  "Line1"          (buffer keeps "Li")
//!  read #2: "ne2\n"       ──▶  "Line2"          (buffer empty)
//! ```
//!
//! The same codec encodes outbound deliveries, appending the terminator.

use std::io;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// Default maximum line length in bytes, excluding the terminator.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// Errors produced while framing lines.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer sent more than `max` bytes without a newline.
    #[error("Line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// Underlying transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Newline-delimited text codec.
///
/// Decoding strips the trailing `\n` and an optional `\r` before it.
/// Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Offset up to which the buffer is known to contain no `\n`.
    next_index: usize,
    max_length: usize,
}

impl LineCodec {
    /// Creates a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Creates a codec that rejects lines longer than `max_length` bytes.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts raw line bytes (terminator already removed) to text.
fn finish_line(mut raw: BytesMut) -> String {
    if raw.last() == Some(&b'\r') {
        raw.truncate(raw.len() - 1);
    }
    String::from_utf8_lossy(&raw).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        // Never look further than one byte past the limit: a newline there
        // still terminates a line of exactly `max_length` bytes.
        let read_to = buf.len().min(self.max_length.saturating_add(1));

        let newline = buf
            .get(self.next_index..read_to)
            .and_then(|unscanned| unscanned.iter().position(|b| *b == b'\n'))
            .map(|offset| self.next_index + offset);

        match newline {
            Some(index) => {
                self.next_index = 0;
                let mut line = buf.split_to(index + 1);
                line.truncate(index);
                Ok(Some(finish_line(line)))
            }
            None if buf.len() > self.max_length => Err(CodecError::LineTooLong {
                max: self.max_length,
            }),
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Only newline-terminated lines are ever routed; a fragment left
        // when the peer closed its side is discarded.
        debug!(bytes = buf.len(), "Discarding unterminated fragment at EOF");
        self.next_index = 0;
        buf.clear();
        Ok(None)
    }
}

impl Encoder<String> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
