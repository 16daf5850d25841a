use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::AppContext;
use crate::errors::AppError;
use crate::identity::validator::AuthError;
use crate::pipeline::{self, RequestId};

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /: liveness banner
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Field Service Copilot backend is running." }))
}

/// POST /api/chat: answer one chat message on behalf of the caller
pub async fn chat(
    State(ctx): State<Arc<AppContext>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let Some(bearer) = bearer_token(&headers) else {
        tracing::warn!(stage = "validate", request_id = %request_id, "Chat request without bearer token");
        ctx.metrics.record_failure("validate");
        ctx.metrics.record_request("error");
        return Err(AuthError::MissingToken.into());
    };

    let reply = pipeline::handle_chat(&ctx, &request_id, bearer, &payload.message).await?;

    Ok(Json(ChatResponse {
        reply: reply.into_string(),
    }))
}

/// GET /readyz: ready once signing keys are loaded
pub async fn readiness(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    if ctx.validator.keys().is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no signing keys")
    } else {
        (StatusCode::OK, "ok")
    }
}

/// GET /metrics: Prometheus text exposition
pub async fn metrics(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        ctx.metrics.encode(),
    )
}

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
