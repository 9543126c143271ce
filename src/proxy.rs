//! Per-request orchestration: one upstream SSE call in, one OpenAI-shaped
//! result out.
//!
//! Streaming mode yields SSE data payloads lazily as upstream lines arrive;
//! blocking mode drains the whole upstream stream first. Each request owns its
//! own [`StreamTranslator`], so requests never share state. Dropping the
//! returned stream drops the reqwest response, which closes the upstream
//! connection when the downstream consumer goes away.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::logging::SharedLogger;
use crate::translate::lke_types::UpstreamPayload;
use crate::translate::openai_types::{ChatCompletionChunk, ChatCompletionResponse};
use crate::translate::sse::{parse_event_block, BlockAssembler};
use crate::translate::streaming::StreamTranslator;

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Literal payload of the stream-terminating SSE unit.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A lazy sequence of SSE `data` payloads: JSON chunks, inline error bodies,
/// and finally [`DONE_SENTINEL`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Open the upstream SSE call, returning its byte stream. Connection failures
/// and error statuses are the request's only fatal path.
async fn call_upstream(
    payload: &UpstreamPayload,
    config: &BridgeConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<impl Stream<Item = std::result::Result<Bytes, reqwest::Error>>> {
    logger.info(
        "upstream",
        format!(
            "POST {} session={} request={}",
            config.upstream.url, payload.session_id, payload.request_id
        ),
    );

    let response = client
        .post(&config.upstream.url)
        .json(payload)
        .send()
        .await
        .map_err(|e| BridgeError::upstream(format!("Upstream request failed: {e}")))?;

    let status = response.status().as_u16();
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(BridgeError::upstream(format!(
            "Upstream returned status {}: {}",
            status,
            truncate(&body, 300)
        )));
    }

    Ok(response.bytes_stream())
}

/// Translate one streaming request. The stream always ends with
/// [`DONE_SENTINEL`], even when the upstream call fails outright; per-block
/// parse failures are surfaced inline and reading continues.
pub fn proxy_streaming(
    payload: UpstreamPayload,
    model: String,
    config: &BridgeConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> ChunkStream {
    let config = config.clone();
    let client = client.clone();
    let logger = logger.clone();

    Box::pin(async_stream::stream! {
        let byte_stream = match call_upstream(&payload, &config, &client, &logger).await {
            Ok(s) => Some(s),
            Err(e) => {
                logger.error("upstream", e.to_string());
                yield error_data(&e.to_string());
                None
            }
        };

        if let Some(byte_stream) = byte_stream {
            let mut assembler = BlockAssembler::new();
            let mut translator = StreamTranslator::new();

            tokio::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        // Connection dropped mid-stream: finalize with what we
                        // have rather than killing the downstream response.
                        logger.error("stream", format!("Byte stream error: {e}"));
                        break;
                    }
                };

                for block in assembler.push_bytes(&bytes) {
                    match parse_event_block(&block)
                        .and_then(|event| translator.process_event(&event))
                    {
                        Ok(Some(delta)) => {
                            logger.debug(
                                "stream",
                                format!("Reasoning delta: {} chars", delta.chars().count()),
                            );
                            let chunk = ChatCompletionChunk::reasoning_delta(&model, delta);
                            if let Ok(json) = serde_json::to_string(&chunk) {
                                yield json;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            logger.warn("stream", format!("Malformed block: {e}"));
                            yield error_data(&e.to_string());
                        }
                    }
                }
            }

            // A blank reply is kept by the translator but not worth a chunk.
            if let Some(reply) = translator.finish().filter(|r| !r.trim().is_empty()) {
                logger.debug(
                    "stream",
                    format!("Final reply: {} chars", reply.chars().count()),
                );
                let chunk = ChatCompletionChunk::final_content(&model, reply);
                if let Ok(json) = serde_json::to_string(&chunk) {
                    yield json;
                }
            }

            logger.info("stream", "Stream completed");
        }

        yield DONE_SENTINEL.to_string();
    })
}

/// Translate one blocking request: drain the upstream stream, then build the
/// aggregated response. Parse failures are folded into the answer text; only
/// the upstream call itself can fail.
pub async fn proxy_non_streaming(
    payload: UpstreamPayload,
    model: String,
    config: &BridgeConfig,
    client: &reqwest::Client,
    logger: &SharedLogger,
) -> Result<ChatCompletionResponse> {
    let byte_stream = call_upstream(&payload, config, client, logger).await?;

    let mut assembler = BlockAssembler::new();
    let mut translator = StreamTranslator::new();
    let mut reasoning = String::new();

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                logger.error("stream", format!("Byte stream error: {e}"));
                break;
            }
        };

        for block in assembler.push_bytes(&bytes) {
            match parse_event_block(&block).and_then(|event| translator.process_event(&event)) {
                Ok(Some(delta)) => {
                    logger.debug(
                        "stream",
                        format!("Reasoning delta: {} chars", delta.chars().count()),
                    );
                    reasoning.push_str(&delta);
                }
                Ok(None) => {}
                Err(e) => {
                    logger.warn("stream", format!("Malformed block: {e}"));
                    translator.record_error(&e);
                }
            }
        }
    }

    let content = translator.finish().unwrap_or_default();

    logger.info(
        "proxy",
        format!(
            "Completed: reasoning={} content={} chars",
            reasoning.chars().count(),
            content.chars().count()
        ),
    );

    Ok(ChatCompletionResponse::aggregated(&model, reasoning, content))
}

fn error_data(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
