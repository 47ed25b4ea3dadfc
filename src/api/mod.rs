//! HTTP router for calendar-tokens.
//!
//! Mounts all endpoint groups under /v1/:
//! - /v1/google-calendar: token exchange, refresh, status, disconnect
//! - /v1/status: health check

pub mod routes;

use crate::SharedState;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    // Callers are the mobile app and browser builds of it; credentials travel
    // in the Authorization header, never in cookies.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/v1", routes::v1_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
