use crate::config::BridgeConfig;
use crate::logging::SharedLogger;
use crate::proxy;
use crate::translate::openai_types::{ChatCompletionRequest, ErrorBody};
use crate::translate::request::build_upstream_payload;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: BridgeConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .route("/logs", get(handle_logs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = check_api_key(&state, &headers) {
        return resp;
    }

    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state
                .logger
                .warn("server", format!("Failed to parse request: {e}"));
            let err = ErrorBody::new(format!("Bad Request: invalid JSON body: {e}"));
            return (StatusCode::BAD_REQUEST, Json(err)).into_response();
        }
    };

    let payload = match build_upstream_payload(
        &req,
        &state.config.models,
        &state.config.upstream.visitor_biz_id,
    ) {
        Ok(p) => p,
        Err(e) => {
            state.logger.warn("server", format!("Rejected request: {e}"));
            return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response();
        }
    };

    let is_streaming = req.stream.unwrap_or(false);

    state.logger.info(
        "server",
        format!(
            "Request: model={} streaming={} session={}",
            req.model, is_streaming, payload.session_id
        ),
    );

    if is_streaming {
        let chunk_stream = proxy::proxy_streaming(
            payload,
            req.model,
            &state.config,
            &state.client,
            &state.logger,
        );

        let event_stream = chunk_stream
            .map(|data| Ok::<_, Infallible>(Event::default().data(data)));

        Sse::new(event_stream).into_response()
    } else {
        match proxy::proxy_non_streaming(
            payload,
            req.model,
            &state.config,
            &state.client,
            &state.logger,
        )
        .await
        {
            Ok(resp) => Json(resp).into_response(),
            Err(e) => {
                state.logger.error("server", format!("Upstream error: {e}"));
                let err = ErrorBody::new(e.to_string());
                (StatusCode::BAD_GATEWAY, Json(err)).into_response()
            }
        }
    }
}

/// Bearer-token allow-list check; keys come from injected config, never
/// process-global state.
fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(provided) = auth.strip_prefix("Bearer ") else {
        state.logger.warn("server", "Missing Authorization header");
        let err = ErrorBody::new("Unauthorized: missing Authorization header");
        return Err((StatusCode::UNAUTHORIZED, Json(err)).into_response());
    };

    let provided = provided.trim();
    if !state.config.api_keys.iter().any(|k| k == provided) {
        state
            .logger
            .warn("server", format!("API key not allowed: {provided}"));
        let err = ErrorBody::new("Unauthorized: API key not allowed");
        return Err((StatusCode::UNAUTHORIZED, Json(err)).into_response());
    }

    Ok(())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Recent request activity from the JSONL ring buffer, newest first.
async fn handle_logs(State(state): State<Arc<AppState>>) -> Json<Vec<crate::logging::LogEntry>> {
    Json(state.logger.recent(100))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models: Vec<serde_json::Value> = state
        .config
        .models
        .keys()
        .map(|name| {
            serde_json::json!({
                "id": name,
                "object": "model",
                "owned_by": "lke-bridge",
            })
        })
        .collect();

    Json(serde_json::json!({ "data": models, "object": "list" }))
}
