use std::borrow::Cow;

const REPLACEMENT: char = '\u{FFFD}';

/// Incremental UTF-8 decoder for a chunked body.
///
/// A multi-byte character split across two chunks is held back until the
/// rest of its bytes arrive. Invalid sequences become U+FFFD instead of
/// failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Leading bytes of a character whose tail has not arrived yet (at most 3).
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, carrying an incomplete trailing character over to
    /// the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            rest = &tail[bad..];
                        }
                        None => {
                            self.pending.extend_from_slice(tail);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end-of-stream. An unfinished character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            tracing::debug!(
                bytes = self.pending.len(),
                "Stream ended inside a multi-byte character"
            );
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }

    /// Whether bytes of an incomplete character are being held.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"data: {}\n\n"), "data: {}\n\n");
        assert!(!decoder.has_pending());
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_character_split_across_chunks() {
        // "é" is 0xC3 0xA9, "€" is 0xE2 0x82 0xAC
        let bytes = "café €".as_bytes();
        let mut decoder = Utf8Decoder::new();

        let first = decoder.decode(&bytes[..4]);
        assert_eq!(first, "caf");
        assert!(decoder.has_pending());

        let second = decoder.decode(&bytes[4..7]);
        assert_eq!(second, "é ");

        let third = decoder.decode(&bytes[7..8]);
        assert_eq!(third, "");
        let fourth = decoder.decode(&bytes[8..]);
        assert_eq!(fourth, "€");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_four_byte_character_byte_by_byte() {
        let bytes = "a🦀b".as_bytes();
        let mut decoder = Utf8Decoder::new();

        let decoded: String = bytes.iter().map(|b| decoder.decode(&[*b])).collect();
        assert_eq!(decoded, "a🦀b");
        assert!(!decoded.contains(REPLACEMENT));
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut decoder = Utf8Decoder::new();
        let decoded = decoder.decode(b"ok\xFFok");
        assert_eq!(decoded, "ok\u{FFFD}ok");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_finish_flushes_incomplete_character() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(!decoder.has_pending());
        assert_eq!(decoder.finish(), "");
    }
}
