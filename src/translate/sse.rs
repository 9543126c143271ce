//! SSE frame parsing for the upstream LKE dialect.
//!
//! The upstream encodes each event as a block of lines terminated by a blank
//! line: zero or one `event:` line naming the kind, and one or more `data:`
//! lines whose remainders concatenate (no separator) into a single JSON
//! document. [`BlockAssembler`] cuts the raw byte stream into blocks;
//! [`parse_event_block`] decodes one block into a [`TypedEvent`].

use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding one event block. All of these are recoverable:
/// the orchestrator surfaces them inline and keeps reading.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no data lines")]
    NoData,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unexpected event shape: {0}")]
    Shape(String),
}

/// One decoded upstream event: the `event:` kind (if any) plus the JSON
/// document assembled from its `data:` lines.
#[derive(Debug, Clone)]
pub struct TypedEvent {
    pub kind: Option<String>,
    pub payload: Value,
}

/// Decode one event block (the non-blank lines between two blank lines).
///
/// `event:` sets the kind (last occurrence wins). `data:` remainders are
/// concatenated in encounter order with no separator, trimmed, and parsed as
/// JSON. Lines with any other field tag are ignored.
pub fn parse_event_block(lines: &[String]) -> Result<TypedEvent, ParseError> {
    let mut kind: Option<String> = None;
    let mut data = String::new();
    let mut saw_data = false;

    for line in lines {
        if let Some(rest) = line.strip_prefix("event:") {
            kind = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push_str(rest);
            saw_data = true;
        }
    }

    if !saw_data {
        return Err(ParseError::NoData);
    }

    let payload: Value = serde_json::from_str(data.trim())?;
    Ok(TypedEvent { kind, payload })
}

/// Incremental splitter: feeds raw upstream bytes in, hands complete event
/// blocks out. Lines may arrive fragmented across reads; a block is complete
/// once a blank line follows at least one non-blank line. Empty blocks
/// (consecutive blank lines) are never emitted.
#[derive(Debug, Default)]
pub struct BlockAssembler {
    buffer: String,
    block: Vec<String>,
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a read's worth of bytes, returning every block completed by it.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Vec<String>> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut blocks = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline_pos);

            if line.is_empty() {
                if !self.block.is_empty() {
                    blocks.push(std::mem::take(&mut self.block));
                }
            } else {
                self.block.push(line);
            }
        }
        blocks
    }
}
