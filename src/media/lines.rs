//! Line framing for external tool output.
//!
//! Media and transfer tools redraw their status line with `\r` instead of
//! emitting a fresh `\n`-terminated line, so [`ToolLineCodec`] treats either
//! byte as a delimiter. Output is decoded lossily: a tool printing a file
//! name in a legacy encoding must not abort progress observation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use merge_courier::media::lines::ToolLineCodec;
//!
//! let lines = FramedRead::new(child_stderr, ToolLineCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::{AppError, Result};

/// Longest line retained by the codec: 64 KiB.
///
/// Longer runs without a delimiter are dropped up to the next delimiter
/// rather than buffered.
pub const MAX_TOOL_LINE_BYTES: usize = 64 * 1024;

/// Decoder yielding trimmed, non-empty lines split on `\n` or `\r`.
#[derive(Debug, Default)]
pub struct ToolLineCodec {
    discarding: bool,
}

impl ToolLineCodec {
    /// Create a codec with the [`MAX_TOOL_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ToolLineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(pos) = src.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                if src.len() > MAX_TOOL_LINE_BYTES {
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let raw = src.split_to(pos + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }

            let line = String::from_utf8_lossy(&raw[..pos]).trim().to_owned();
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        let rest = src.split();
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&rest).trim().to_owned();
        Ok((!line.is_empty()).then_some(line))
    }
}
