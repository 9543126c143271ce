//! Type definitions for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//!
//! These cover what a client sends us (requests) and what we emit back
//! (streaming chunks and aggregated responses). The upstream LKE shapes live
//! in [`super::lke_types`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what the client sends TO us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Optional upstream session pin; a fresh one is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    // Catch-all for sampling params and other fields we accept but ignore
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl ChatContent {
    /// Flatten to plain text; multi-part content keeps text parts in order.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.as_str(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
}

// ---------------------------------------------------------------------------
// Streaming chunk types (what we emit back, streaming mode)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub index: u64,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// An incremental chain-of-thought delta; never carries a finish reason.
    pub fn reasoning_delta(model: &str, delta: impl Into<String>) -> Self {
        Self::build(
            model,
            ChunkDelta {
                reasoning_content: Some(delta.into()),
                content: None,
            },
            None,
        )
    }

    /// The single final-answer chunk closing the stream.
    pub fn final_content(model: &str, content: impl Into<String>) -> Self {
        Self::build(
            model,
            ChunkDelta {
                reasoning_content: None,
                content: Some(content.into()),
            },
            Some("stop".to_string()),
        )
    }

    fn build(model: &str, delta: ChunkDelta, finish_reason: Option<String>) -> Self {
        Self {
            id: chunk_id(),
            object: "chat.completion.chunk".to_string(),
            created: now_epoch(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                delta,
                index: 0,
                finish_reason,
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregated response (non-streaming mode)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
    pub index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    #[serde(default)]
    pub reasoning_content: String,
    #[serde(default)]
    pub content: String,
}

impl ChatCompletionResponse {
    /// Build the blocking-mode response from drained stream state.
    pub fn aggregated(
        model: &str,
        reasoning_content: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: chunk_id(),
            object: "chat.completion".to_string(),
            created: now_epoch(),
            model: model.to_string(),
            choices: vec![Choice {
                message: ChoiceMessage {
                    role: "assistant".to_string(),
                    reasoning_content: reasoning_content.into(),
                    content: content.into(),
                },
                finish_reason: Some("stop".to_string()),
                index: 0,
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// Flat error payload, used both for HTTP error responses and for inline
/// error units within a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

fn chunk_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

fn now_epoch() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
