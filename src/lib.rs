pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::TokenError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub tokens: service::TokenService,
}

pub type SharedState = Arc<AppState>;
