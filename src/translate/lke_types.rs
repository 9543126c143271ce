//! Type definitions for the Tencent Cloud LKE bot-chat interface.
//!
//! Covers the request payload we POST to the SSE endpoint and the two event
//! payload shapes we care about: `thought` (full reasoning snapshots, nested
//! in the last procedure's debugging record) and `reply` (candidate answers).

use super::sse::{ParseError, TypedEvent};
use serde::{Deserialize, Serialize};

/// Request body for the LKE bot-chat SSE endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamPayload {
    pub bot_app_key: String,
    pub visitor_biz_id: String,
    pub session_id: String,
    pub request_id: String,
    pub content: String,
    pub visitor_labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ThoughtEnvelope {
    payload: ThoughtPayload,
}

#[derive(Debug, Deserialize)]
struct ThoughtPayload {
    #[serde(default)]
    procedures: Vec<Procedure>,
}

#[derive(Debug, Deserialize)]
struct Procedure {
    debugging: Option<Debugging>,
}

#[derive(Debug, Deserialize)]
struct Debugging {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    payload: ReplyPayload,
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    content: String,
}

/// Extract the full reasoning snapshot from a `thought` event: the
/// `debugging.content` of the last procedure.
pub fn thought_snapshot(event: &TypedEvent) -> Result<String, ParseError> {
    let envelope: ThoughtEnvelope = serde_json::from_value(event.payload.clone())
        .map_err(|e| ParseError::Shape(format!("thought payload: {e}")))?;

    envelope
        .payload
        .procedures
        .last()
        .and_then(|p| p.debugging.as_ref())
        .and_then(|d| d.content.clone())
        .ok_or_else(|| ParseError::Shape("thought event carries no reasoning content".to_string()))
}

/// Extract the answer text from a `reply` event.
pub fn reply_content(event: &TypedEvent) -> Result<String, ParseError> {
    let envelope: ReplyEnvelope = serde_json::from_value(event.payload.clone())
        .map_err(|e| ParseError::Shape(format!("reply payload: {e}")))?;
    Ok(envelope.payload.content)
}
