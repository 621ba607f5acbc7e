//! Reassembles UTF-8 text from arbitrarily split byte chunks.

/// Accumulates raw bytes and hands out only complete UTF-8 text.
///
/// A multi-byte character cut across two network chunks stays in the buffer
/// until the rest of it arrives. Bytes that can never form a valid character
/// (as opposed to a truncated tail) are replaced with U+FFFD so the stream
/// keeps flowing.
#[derive(Debug, Default)]
pub struct Utf8Buffer {
    buffer: Vec<u8>,
}

impl Utf8Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Remove and return the longest prefix that is complete text.
    /// Returns an empty string when nothing can be emitted yet.
    pub fn take_complete_text(&mut self) -> String {
        let mut out = String::new();
        let mut consumed = 0;

        loop {
            let rest = &self.buffer[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.buffer.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        // Truncated tail, wait for the next chunk
                        None => {
                            consumed += valid;
                            break;
                        }
                        Some(bad) => {
                            log::warn!("[UTF8] Replacing {} invalid byte(s) in stream", bad);
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + bad;
                        }
                    }
                }
            }
        }

        self.buffer.drain(..consumed);
        out
    }

    /// Bytes currently held back.
    #[cfg(test)]
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// End of stream: drop whatever incomplete tail is left and report its size.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 {
            log::debug!("[UTF8] Discarding {} undecodable trailing byte(s) at EOF", dropped);
        }
        self.buffer.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Hi 你好, ¿qué tal? 👋🏽 done";

    fn reassemble(chunks: &[&[u8]]) -> String {
        let mut buffer = Utf8Buffer::new();
        let mut out = String::new();
        for chunk in chunks {
            buffer.add_chunk(chunk);
            out.push_str(&buffer.take_complete_text());
        }
        out
    }

    #[test]
    fn test_every_two_way_split_reassembles() {
        let bytes = SAMPLE.as_bytes();
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(reassemble(&[a, b]), SAMPLE, "split at {}", split);
        }
    }

    #[test]
    fn test_fixed_chunk_sizes_reassemble() {
        let bytes = SAMPLE.as_bytes();
        for size in 1..=7 {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            assert_eq!(reassemble(&chunks), SAMPLE, "chunk size {}", size);
        }
    }

    #[test]
    fn test_incomplete_sequence_is_held_back() {
        let mut buffer = Utf8Buffer::new();
        let euro = "€".as_bytes(); // 3 bytes
        buffer.add_chunk(&[b'a', euro[0], euro[1]]);
        assert_eq!(buffer.take_complete_text(), "a");
        assert_eq!(buffer.pending(), &euro[..2]);

        buffer.add_chunk(&euro[2..]);
        assert_eq!(buffer.take_complete_text(), "€");
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn test_nothing_complete_returns_empty() {
        let mut buffer = Utf8Buffer::new();
        buffer.add_chunk(&"你".as_bytes()[..1]);
        assert_eq!(buffer.take_complete_text(), "");
        assert_eq!(buffer.pending().len(), 1);
    }

    #[test]
    fn test_invalid_byte_does_not_stall_stream() {
        let mut buffer = Utf8Buffer::new();
        buffer.add_chunk(&[b'o', b'k', 0xFF, b'!']);
        assert_eq!(buffer.take_complete_text(), "ok\u{FFFD}!");
        buffer.add_chunk(b" more");
        assert_eq!(buffer.take_complete_text(), " more");
    }

    /// Known lossy edge case: a stream that ends mid-character loses the tail.
    #[test]
    fn test_truncated_tail_at_eof_is_discarded() {
        let mut buffer = Utf8Buffer::new();
        let emoji = "👋".as_bytes();
        buffer.add_chunk(b"bye ");
        buffer.add_chunk(&emoji[..2]);
        assert_eq!(buffer.take_complete_text(), "bye ");
        assert_eq!(buffer.finish(), 2);
        assert!(buffer.pending().is_empty());
    }
}
