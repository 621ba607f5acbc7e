//! Line framing and decoding of the completion response body.

use serde_json::Value;

use super::types::DeltaEvent;

const DATA_PREFIX: &[u8] = b"data: ";

/// One line of the completion body, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// An SSE `data:` frame; empty if the frame was malformed.
    Deltas(Vec<DeltaEvent>),
    /// Any other line, passed through byte for byte (newline included).
    Raw(Vec<u8>),
}

/// Splits an arbitrary byte stream into `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line including its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline_pos = self.buffer.iter().position(|b| *b == b'\n')?;
        Some(self.buffer.drain(..=newline_pos).collect())
    }

    /// Unterminated remainder at EOF.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

pub fn decode_line(line: &[u8]) -> StreamItem {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return StreamItem::Raw(line.to_vec());
    };

    match serde_json::from_slice::<Value>(payload) {
        Ok(frame) => StreamItem::Deltas(
            frame
                .get("delta")
                .and_then(Value::as_array)
                .map(|deltas| deltas.iter().map(DeltaEvent::from_value).collect())
                .unwrap_or_default(),
        ),
        Err(e) => {
            log::warn!(
                "[KERNEL] Dropping malformed SSE frame ({}): {}",
                e,
                String::from_utf8_lossy(payload).trim_end()
            );
            StreamItem::Deltas(Vec::new())
        }
    }
}
