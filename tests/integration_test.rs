use futures::StreamExt;
use lke_bridge::config::{BridgeConfig, UpstreamConfig};
use lke_bridge::logging::SharedLogger;
use lke_bridge::proxy;
use lke_bridge::translate::lke_types::UpstreamPayload;
use std::collections::HashMap;

// ────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────

fn thought_block(content: &str) -> String {
    format!(
        "event:thought\ndata:{}\n\n",
        serde_json::json!({
            "payload": {"procedures": [{"debugging": {"content": content}}]}
        })
    )
}

fn reply_block(content: &str) -> String {
    format!(
        "event:reply\ndata:{}\n\n",
        serde_json::json!({"payload": {"content": content}})
    )
}

/// A full upstream session: two thought snapshots, the echo reply, the answer.
fn scenario_body() -> String {
    let mut body = String::new();
    body.push_str(&thought_block("Hi"));
    body.push_str(&thought_block("Hi there"));
    body.push_str(&reply_block("echo"));
    body.push_str(&reply_block("Final answer"));
    body
}

/// Serve `body` once per POST from a local listener, returning its URL.
async fn mock_upstream(body: String) -> String {
    let app = axum::Router::new().route(
        "/sse",
        axum::routing::post(move || {
            let body = body.clone();
            async move {
                axum::response::Response::builder()
                    .header("content-type", "text/event-stream")
                    .body(axum::body::Body::from(body))
                    .unwrap()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/sse")
}

fn bridge_config(upstream_url: String) -> BridgeConfig {
    let mut models = HashMap::new();
    models.insert("my-bot".to_string(), "app-key-1".to_string());

    BridgeConfig {
        port: 0,
        upstream: UpstreamConfig {
            url: upstream_url,
            timeout_secs: 5,
            visitor_biz_id: "cli_user".to_string(),
        },
        api_keys: vec!["sk-test".to_string()],
        models,
    }
}

fn upstream_payload() -> UpstreamPayload {
    UpstreamPayload {
        bot_app_key: "app-key-1".to_string(),
        visitor_biz_id: "cli_user".to_string(),
        session_id: "session-1".to_string(),
        request_id: "request-1".to_string(),
        content: "hello".to_string(),
        visitor_labels: Vec::new(),
    }
}

fn test_logger() -> (tempfile::TempDir, SharedLogger) {
    let dir = tempfile::tempdir().unwrap();
    let logger = SharedLogger::new(dir.path().join("test.log")).unwrap();
    (dir, logger)
}

async fn collect_stream(
    config: &BridgeConfig,
    logger: &SharedLogger,
) -> Vec<String> {
    let client = reqwest::Client::new();
    let stream = proxy::proxy_streaming(
        upstream_payload(),
        "my-bot".to_string(),
        config,
        &client,
        logger,
    );
    stream.collect::<Vec<_>>().await
}

// ────────────────────────────────────────────────────────────────
// Orchestrator, streaming mode
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_streaming_scenario() {
    let url = mock_upstream(scenario_body()).await;
    let config = bridge_config(url);
    let (_dir, logger) = test_logger();

    let items = collect_stream(&config, &logger).await;
    assert_eq!(items.len(), 4, "items: {items:?}");

    let first: serde_json::Value = serde_json::from_str(&items[0]).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["model"], "my-bot");
    assert_eq!(first["choices"][0]["delta"]["reasoning_content"], "Hi");
    assert!(first["choices"][0]["finish_reason"].is_null());

    let second: serde_json::Value = serde_json::from_str(&items[1]).unwrap();
    assert_eq!(second["choices"][0]["delta"]["reasoning_content"], " there");

    let third: serde_json::Value = serde_json::from_str(&items[2]).unwrap();
    assert_eq!(third["choices"][0]["delta"]["content"], "Final answer");
    assert_eq!(third["choices"][0]["finish_reason"], "stop");

    assert_eq!(items[3], "[DONE]");
}

#[tokio::test]
async fn test_streaming_echo_only_goes_straight_to_done() {
    let url = mock_upstream(reply_block("echo")).await;
    let config = bridge_config(url);
    let (_dir, logger) = test_logger();

    let items = collect_stream(&config, &logger).await;
    assert_eq!(items, vec!["[DONE]".to_string()]);
}

#[tokio::test]
async fn test_streaming_transport_failure_still_emits_done() {
    // Bind and immediately drop a listener so the port refuses connections.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = bridge_config(format!("http://{addr}/sse"));
    let (_dir, logger) = test_logger();

    let items = collect_stream(&config, &logger).await;
    assert_eq!(items.len(), 2, "items: {items:?}");

    let error: serde_json::Value = serde_json::from_str(&items[0]).unwrap();
    assert!(error["error"].as_str().unwrap().contains("Upstream request failed"));
    assert_eq!(items[1], "[DONE]");
}

#[tokio::test]
async fn test_streaming_malformed_block_is_surfaced_inline() {
    let mut body = String::new();
    body.push_str("event:thought\ndata:not-json\n\n");
    body.push_str(&reply_block("echo"));
    body.push_str(&reply_block("ok"));

    let url = mock_upstream(body).await;
    let config = bridge_config(url);
    let (_dir, logger) = test_logger();

    let items = collect_stream(&config, &logger).await;
    assert_eq!(items.len(), 3, "items: {items:?}");

    let error: serde_json::Value = serde_json::from_str(&items[0]).unwrap();
    assert!(error["error"].as_str().unwrap().contains("invalid JSON"));

    // Translation keeps going after the bad block.
    let final_chunk: serde_json::Value = serde_json::from_str(&items[1]).unwrap();
    assert_eq!(final_chunk["choices"][0]["delta"]["content"], "ok");
    assert_eq!(items[2], "[DONE]");
}

// ────────────────────────────────────────────────────────────────
// Orchestrator, blocking mode
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_non_streaming_matches_streaming_output() {
    let url = mock_upstream(scenario_body()).await;
    let config = bridge_config(url);
    let client = reqwest::Client::new();
    let (_dir, logger) = test_logger();

    let resp = proxy::proxy_non_streaming(
        upstream_payload(),
        "my-bot".to_string(),
        &config,
        &client,
        &logger,
    )
    .await
    .unwrap();

    let msg = &resp.choices[0].message;
    // Concatenation of the deltas the streaming path emits, not the snapshots.
    assert_eq!(msg.reasoning_content, "Hi there");
    assert_eq!(msg.content, "Final answer");
    assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    assert_eq!(resp.model, "my-bot");
}

#[tokio::test]
async fn test_non_streaming_echo_only_yields_empty_content() {
    let url = mock_upstream(reply_block("echo")).await;
    let config = bridge_config(url);
    let client = reqwest::Client::new();
    let (_dir, logger) = test_logger();

    let resp = proxy::proxy_non_streaming(
        upstream_payload(),
        "my-bot".to_string(),
        &config,
        &client,
        &logger,
    )
    .await
    .unwrap();

    assert_eq!(resp.choices[0].message.content, "");
    assert_eq!(resp.choices[0].message.reasoning_content, "");
}

#[tokio::test]
async fn test_non_streaming_whitespace_reply_is_returned_verbatim() {
    let mut body = String::new();
    body.push_str(&reply_block("echo"));
    body.push_str(&reply_block("   "));

    let url = mock_upstream(body).await;
    let config = bridge_config(url);
    let client = reqwest::Client::new();
    let (_dir, logger) = test_logger();

    let resp = proxy::proxy_non_streaming(
        upstream_payload(),
        "my-bot".to_string(),
        &config,
        &client,
        &logger,
    )
    .await
    .unwrap();

    // Blocking mode hands the stored reply over untrimmed; only the
    // streaming content chunk is gated on non-blank text.
    assert_eq!(resp.choices[0].message.content, "   ");
}

#[tokio::test]
async fn test_streaming_whitespace_reply_emits_no_content_chunk() {
    let mut body = String::new();
    body.push_str(&reply_block("echo"));
    body.push_str(&reply_block("   "));

    let url = mock_upstream(body).await;
    let config = bridge_config(url);
    let (_dir, logger) = test_logger();

    let items = collect_stream(&config, &logger).await;
    assert_eq!(items, vec!["[DONE]".to_string()]);
}

#[tokio::test]
async fn test_non_streaming_transport_failure_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = bridge_config(format!("http://{addr}/sse"));
    let client = reqwest::Client::new();
    let (_dir, logger) = test_logger();

    let result = proxy::proxy_non_streaming(
        upstream_payload(),
        "my-bot".to_string(),
        &config,
        &client,
        &logger,
    )
    .await;

    assert!(result.is_err());
}

// ────────────────────────────────────────────────────────────────
// Full server roundtrip
// ────────────────────────────────────────────────────────────────

async fn spawn_bridge(
    config: BridgeConfig,
) -> (std::net::SocketAddr, reqwest::Client, tempfile::TempDir) {
    let client = reqwest::Client::new();
    let (dir, logger) = test_logger();

    let state = std::sync::Arc::new(lke_bridge::AppState {
        config,
        client: client.clone(),
        logger,
    });

    let app = lke_bridge::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, client, dir)
}

#[tokio::test]
async fn test_server_rejects_missing_and_unknown_keys() {
    let url = mock_upstream(scenario_body()).await;
    let (addr, client, _dir) = spawn_bridge(bridge_config(url)).await;

    let req_body = serde_json::json!({
        "model": "my-bot",
        "messages": [{"role": "user", "content": "hi"}],
    });

    let resp = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&req_body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized: missing Authorization header");

    let resp = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .header("Authorization", "Bearer sk-wrong")
        .json(&req_body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized: API key not allowed");
}

#[tokio::test]
async fn test_server_rejects_unknown_model() {
    let url = mock_upstream(scenario_body()).await;
    let (addr, client, _dir) = spawn_bridge(bridge_config(url)).await;

    let resp = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .header("Authorization", "Bearer sk-test")
        .json(&serde_json::json!({
            "model": "not-a-bot",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid model"));
}

#[tokio::test]
async fn test_server_non_streaming_roundtrip() {
    let url = mock_upstream(scenario_body()).await;
    let (addr, client, _dir) = spawn_bridge(bridge_config(url)).await;

    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 200);

    let resp = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .header("Authorization", "Bearer sk-test")
        .json(&serde_json::json!({
            "model": "my-bot",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["reasoning_content"], "Hi there");
    assert_eq!(body["choices"][0]["message"]["content"], "Final answer");
}

#[tokio::test]
async fn test_server_streaming_roundtrip() {
    let url = mock_upstream(scenario_body()).await;
    let (addr, client, _dir) = spawn_bridge(bridge_config(url)).await;

    let resp = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .header("Authorization", "Bearer sk-test")
        .json(&serde_json::json!({
            "model": "my-bot",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    assert!(content_type.contains("text/event-stream"), "{content_type}");

    let text = resp.text().await.unwrap();
    assert!(text.contains("reasoning_content"));
    assert!(text.contains("Final answer"));
    assert!(text.ends_with("data: [DONE]\n\n"), "tail: {:?}", &text[text.len().saturating_sub(40)..]);
}

#[tokio::test]
async fn test_server_logs_endpoint() {
    let url = mock_upstream(scenario_body()).await;
    let (addr, client, _dir) = spawn_bridge(bridge_config(url)).await;

    let _ = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .header("Authorization", "Bearer sk-test")
        .json(&serde_json::json!({
            "model": "my-bot",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("http://{addr}/logs"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let entries: serde_json::Value = resp.json().await.unwrap();
    let entries = entries.as_array().unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().any(|e| e["component"] == "server"));
}

#[tokio::test]
async fn test_server_models_endpoint() {
    let url = mock_upstream(String::new()).await;
    let (addr, client, _dir) = spawn_bridge(bridge_config(url)).await;

    let resp = client
        .get(format!("http://{addr}/v1/models"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"][0]["id"], "my-bot");
}
