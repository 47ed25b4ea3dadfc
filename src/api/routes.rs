//! API route handlers for the calendar-tokens service.
//!
//! All handlers receive `SharedState` via Axum state extraction and pass the
//! caller's bearer credential straight to the token service, which owns
//! authentication.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;

use crate::auth::bearer_token;
use crate::error::TokenError;
use crate::service::{ExchangeRequest, RefreshRequest};
use crate::SharedState;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Google Calendar tokens ───────────────────────────────────────
        .route("/google-calendar/token/exchange", post(token_exchange))
        .route("/google-calendar/token/refresh", post(token_refresh))
        .route("/google-calendar/token", delete(token_disconnect))
        .route("/google-calendar/status", get(connection_status))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "calendar-tokens",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Token Endpoints
// =============================================================================

fn authorization(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()))
}

/// Unwrap a JSON body. A malformed body is reported only once the caller is
/// known, so anonymous requests always see `unauthenticated`.
async fn json_body<T>(
    state: &SharedState,
    headers: &HeaderMap,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, TokenError> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            state.tokens.authenticate(authorization(headers)).await?;
            Err(TokenError::InvalidArgument(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )))
        }
    }
}

/// POST /v1/google-calendar/token/exchange: Trade a server auth code for tokens.
async fn token_exchange(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, TokenError> {
    let body = json_body(&state, &headers, body).await?;
    let resp = state.tokens.exchange(authorization(&headers), body).await?;
    Ok(Json(json!({ "data": resp })))
}

/// POST /v1/google-calendar/token/refresh: Mint a new access token.
async fn token_refresh(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, TokenError> {
    let body = json_body(&state, &headers, body).await?;
    let resp = state.tokens.refresh(authorization(&headers), body).await?;
    Ok(Json(json!({ "data": resp })))
}

/// GET /v1/google-calendar/status: Whether the caller has tokens stored.
async fn connection_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, TokenError> {
    let resp = state.tokens.status(authorization(&headers)).await?;
    Ok(Json(json!({ "data": resp })))
}

/// DELETE /v1/google-calendar/token: Disconnect Google Calendar.
async fn token_disconnect(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, TokenError> {
    let resp = state.tokens.disconnect(authorization(&headers)).await?;
    Ok(Json(json!({ "data": resp })))
}
