//! State machine for translating upstream LKE events into OpenAI deltas.
//!
//! The [`StreamTranslator`] consumes [`TypedEvent`]s one at a time for the
//! lifetime of a single request. `thought` events arrive as full snapshots of
//! the reasoning so far and are diffed against the previous snapshot to yield
//! an incremental delta. `reply` events arrive at least twice: the first is an
//! echo of the user's input and is discarded; of the rest, only the last one
//! seen before the stream ends is the answer.
//!
//! Usage:
//!   let mut translator = StreamTranslator::new();
//!   for event in events {
//!       if let Some(delta) = translator.process_event(&event)? {
//!           // emit a reasoning_content chunk
//!       }
//!   }
//!   let answer = translator.finish(); // emit the content chunk, if any

use super::lke_types::{reply_content, thought_snapshot};
use super::repair::fix_encoding;
use super::sse::{ParseError, TypedEvent};

#[derive(Debug, Default)]
pub struct StreamTranslator {
    last_reasoning: String,
    first_reply_seen: bool,
    final_reply: Option<String>,
}

impl StreamTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one upstream event. Returns `Ok(Some(delta))` when a non-blank
    /// reasoning delta should be emitted; `reply` events and events of any
    /// other kind produce `Ok(None)`.
    pub fn process_event(&mut self, event: &TypedEvent) -> Result<Option<String>, ParseError> {
        match event.kind.as_deref() {
            Some("thought") => {
                let snapshot = fix_encoding(&thought_snapshot(event)?);
                Ok(self.push_snapshot(snapshot))
            }
            Some("reply") => {
                let content = fix_encoding(&reply_content(event)?);
                if self.first_reply_seen {
                    // Only the last reply is authoritative; earlier ones are
                    // superseded, not accumulated.
                    self.final_reply = Some(content);
                } else {
                    // The first reply echoes the user's input.
                    self.first_reply_seen = true;
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Diff a new full snapshot against the previous one. A snapshot that
    /// extends the previous yields its suffix; anything else (upstream reset
    /// or rewrite) is re-emitted in full. The stored snapshot advances either
    /// way, and whitespace-only deltas are suppressed.
    fn push_snapshot(&mut self, snapshot: String) -> Option<String> {
        let delta = if snapshot.starts_with(&self.last_reasoning) {
            snapshot[self.last_reasoning.len()..].to_string()
        } else {
            snapshot.clone()
        };
        self.last_reasoning = snapshot;

        if delta.trim().is_empty() {
            None
        } else {
            Some(delta)
        }
    }

    /// Fold a block-level error into the final answer. Used by the blocking
    /// path, where there is no stream to surface the error inline.
    pub fn record_error(&mut self, err: &ParseError) {
        self.final_reply = Some(format!("Error: {err}"));
    }

    /// Call once the upstream stream is exhausted. Returns the authoritative
    /// final answer verbatim, or `None` when no usable reply was seen (at
    /// most the echo). The streaming path additionally withholds its content
    /// chunk for blank replies; the blocking path returns them as-is.
    pub fn finish(self) -> Option<String> {
        self.final_reply
    }
}
