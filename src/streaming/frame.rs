use crate::config::TrailingFramePolicy;
use crate::error::{CouncilError, Result};

/// Accumulates decoded text and cuts it into blank-line delimited frames.
///
/// A frame is only handed out once its delimiter has arrived; anything after
/// the last delimiter stays buffered for the next chunk.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: String,
    /// Byte offset up to which the buffer is known to hold no delimiter.
    scanned: usize,
    max_frame_bytes: usize,
    policy: TrailingFramePolicy,
}

impl FrameAssembler {
    pub fn new(policy: TrailingFramePolicy, max_frame_bytes: usize) -> Self {
        Self {
            buffer: String::with_capacity(8192),
            scanned: 0,
            max_frame_bytes,
            policy,
        }
    }

    /// Append decoded text.
    ///
    /// Fails if the buffer now holds more than `max_frame_bytes` with no
    /// delimiter in it.
    pub fn push(&mut self, text: &str) -> Result<()> {
        self.buffer.push_str(text);

        if self.buffer.len() > self.max_frame_bytes && find_delimiter(&self.buffer, 0).is_none() {
            return Err(CouncilError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }

        Ok(())
    }

    /// Extract the next complete frame, without its delimiter.
    pub fn next_frame(&mut self) -> Option<String> {
        let Some((start, len)) = find_delimiter(&self.buffer, self.scanned) else {
            // A delimiter may straddle the end of the buffer, so rescan the
            // last three bytes next time.
            self.scanned = floor_char_boundary(&self.buffer, self.buffer.len().saturating_sub(3));
            return None;
        };

        let frame = self.buffer[..start].to_string();
        self.buffer.drain(..start + len);
        self.scanned = 0;
        Some(frame)
    }

    /// Handle whatever is left at end-of-stream according to the trailing
    /// frame policy. Call after `next_frame` has returned `None`.
    pub fn finish(&mut self) -> Option<String> {
        let remainder = std::mem::take(&mut self.buffer);
        self.scanned = 0;

        if remainder.trim().is_empty() {
            return None;
        }

        match self.policy {
            TrailingFramePolicy::Flush => {
                tracing::debug!(
                    bytes = remainder.len(),
                    "Flushing undelimited trailing frame"
                );
                Some(remainder)
            }
            TrailingFramePolicy::Drop => {
                tracing::debug!(
                    bytes = remainder.len(),
                    "Dropping undelimited trailing frame"
                );
                None
            }
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Earliest `\n\n` or `\r\n\r\n` at or after `from`, as (offset, length).
fn find_delimiter(buffer: &str, from: usize) -> Option<(usize, usize)> {
    let haystack = &buffer[from..];
    let lf = haystack.find("\n\n").map(|i| (from + i, 2));
    let crlf = haystack.find("\r\n\r\n").map(|i| (from + i, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
