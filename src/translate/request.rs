//! Translate OpenAI Chat Completions requests into LKE bot-chat payloads.
//!
//! The upstream takes a single utterance per call, so only the most recent
//! user message is forwarded; prior turns are carried by the upstream session
//! (pinned via `session_id` when the client supplies one).

use super::lke_types::UpstreamPayload;
use super::openai_types::ChatCompletionRequest;
use std::collections::HashMap;
use thiserror::Error;

/// Client-side request problems, all answered with HTTP 400.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid model. Supported: {0}")]
    UnknownModel(String),

    #[error("Bad Request: 'messages' field is required")]
    NoMessages,

    #[error("No user message found in 'messages'")]
    NoUserMessage,
}

/// Build the upstream payload for one request. `models` maps the client-facing
/// model name to the LKE `bot_app_key`.
pub fn build_upstream_payload(
    req: &ChatCompletionRequest,
    models: &HashMap<String, String>,
    visitor_biz_id: &str,
) -> Result<UpstreamPayload, RequestError> {
    let bot_app_key = models.get(&req.model).ok_or_else(|| {
        let mut supported: Vec<&str> = models.keys().map(String::as_str).collect();
        supported.sort_unstable();
        RequestError::UnknownModel(supported.join(", "))
    })?;

    if req.messages.is_empty() {
        return Err(RequestError::NoMessages);
    }

    let content = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .and_then(|m| m.content.as_ref())
        .map(|c| c.as_text())
        .filter(|text| !text.is_empty())
        .ok_or(RequestError::NoUserMessage)?;

    let session_id = req
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(UpstreamPayload {
        bot_app_key: bot_app_key.clone(),
        visitor_biz_id: visitor_biz_id.to_string(),
        session_id,
        request_id: uuid::Uuid::new_v4().to_string(),
        content,
        visitor_labels: Vec::new(),
    })
}
