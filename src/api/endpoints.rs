//! API endpoint handlers
//!
//! This module implements the HTTP endpoints of the prompt relay: the relay
//! itself, a service description at the root, and a health check.

use crate::api::error::RelayError;
use crate::core::client::GeminiClient;
use crate::core::config::Config;
use crate::core::constants::{cors, message, route};
use crate::models::gemini::extract_reply;
use crate::models::relay::{PromptRequest, TextResponse};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: Arc<GeminiClient>,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route(route::RELAY, any(relay_prompt))
        .route(route::HEALTH, get(health_check))
        .with_state(state)
}

/// ANY /api/ai - Relay a prompt to Gemini
async fn relay_prompt(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("relay", %request_id, %method);

    match handle_relay(&state, &method, &body).instrument(span).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle_relay(
    state: &AppState,
    method: &Method,
    body: &[u8],
) -> Result<Response, RelayError> {
    let Some(api_key) = state.config.api_key() else {
        error!("Rejecting request: credential is not configured");
        return Err(RelayError::MissingCredential);
    };

    if *method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    if *method != Method::POST {
        warn!("Rejecting {} request", method);
        return Err(RelayError::MethodNotAllowed(method.clone()));
    }

    let request: PromptRequest = serde_json::from_slice(body).map_err(|e| {
        warn!("Rejecting unparseable request body: {}", e);
        RelayError::MissingPrompt
    })?;
    let prompt = request.prompt().ok_or_else(|| {
        warn!("Rejecting request without prompt");
        RelayError::MissingPrompt
    })?;

    info!("📥 Incoming relay request: prompt_chars={}", prompt.chars().count());

    let upstream_body = state.client.generate_content(api_key, prompt).await?;

    let reply = extract_reply(&upstream_body).map_err(|e| {
        error!("Upstream returned a body that is not JSON: {}", e);
        RelayError::InvalidResponse
    })?;

    if let Some(usage) = &reply.usage {
        debug!(
            "Token usage: prompt={:?}, candidates={:?}, total={:?}",
            usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
        );
    }

    let text = match reply.text {
        Some(text) => text,
        None => {
            warn!(
                "Upstream reply had no text (finish_reason={:?}, block_reason={:?}); using fallback",
                reply.finish_reason, reply.block_reason
            );
            message::FALLBACK_REPLY.to_string()
        }
    };

    Ok(with_cors_origin(Json(TextResponse { text }).into_response()))
}

/// 200 with an empty body and the CORS headers
fn preflight_response() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(cors::ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(cors::ALLOW_HEADERS),
    );
    with_cors_origin(response)
}

fn with_cors_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(cors::ALLOW_ORIGIN),
    );
    response
}

/// GET / - Root endpoint
async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let policy = state.client.retry_policy();
    Json(json!({
        "message": "Prompt Relay v0.1.0",
        "status": "running",
        "config": {
            "model": state.config.model,
            "api_key_configured": state.config.has_api_key(),
            "max_attempts": policy.max_attempts,
            "base_delay_ms": policy.base_delay.as_millis() as u64,
        },
        "endpoints": {
            "relay": route::RELAY,
            "health": route::HEALTH,
        },
    }))
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "api_key_configured": state.config.has_api_key(),
    }))
}
