//! Line-delimited JSON decoding for stream bodies.
//!
//! Chunks arrive with no alignment to protocol lines. The decoder buffers
//! until a newline, strips the terminator (`\n` or `\r\n`) and hands each
//! non-empty line to the handler as a parsed JSON value. Blank lines are
//! keep-alives and are dropped.

use serde_json::Value;
use tracing::debug;

use crate::error::{TwitterError, TwitterResult};

/// Longest prefix of a malformed line kept in the error.
const MAX_ERROR_LINE: usize = 256;

/// Incremental newline-delimited JSON decoder.
///
/// There is no limit on line length; stream servers are trusted.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Number of bytes held for an incomplete line.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed a chunk, calling `handler` once per complete non-empty line.
    ///
    /// # Errors
    ///
    /// A line that is not valid JSON stops decoding and returns
    /// [`TwitterError::Decode`]; the decoder should be discarded with the
    /// connection it belongs to.
    pub fn feed<F>(&mut self, chunk: &[u8], mut handler: F) -> TwitterResult<()>
    where
        F: FnMut(Value),
    {
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let line = self.buffer[start..end].trim_ascii();
            start = end + 1;

            if line.is_empty() {
                debug!("Received keep-alive");
                continue;
            }

            match serde_json::from_slice::<Value>(line) {
                Ok(message) => handler(message),
                Err(source) => {
                    let line = truncate_lossy(line);
                    self.buffer.clear();
                    return Err(TwitterError::Decode { line, source });
                }
            }
        }

        self.buffer.drain(..start);
        Ok(())
    }
}

fn truncate_lossy(line: &[u8]) -> String {
    let end = line.len().min(MAX_ERROR_LINE);
    String::from_utf8_lossy(&line[..end]).into_owned()
}
