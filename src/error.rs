use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the calendar-tokens service.
///
/// Every variant reports one of `unauthenticated`, `invalid-argument`,
/// `failed-precondition` or `internal` on the wire.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    // ── Caller Errors ───────────────────────────────────────────────────
    #[error("The user must be authenticated")]
    Unauthenticated,

    #[error("{0}")]
    InvalidArgument(String),

    // ── Deployment Errors ───────────────────────────────────────────────
    #[error("{0}")]
    FailedPrecondition(String),

    // ── Upstream Errors ─────────────────────────────────────────────────
    #[error("OAuth provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cipher error: {0}")]
    Cipher(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("{0}")]
    Internal(String),
}

impl TokenError {
    /// The wire-level error kind reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Unauthenticated => "unauthenticated",
            TokenError::InvalidArgument(_) => "invalid-argument",
            TokenError::FailedPrecondition(_) => "failed-precondition",
            TokenError::Provider(_)
            | TokenError::Database(_)
            | TokenError::Cipher(_)
            | TokenError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TokenError::Unauthenticated => StatusCode::UNAUTHORIZED,
            TokenError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            TokenError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Collapse upstream failures into a generic internal error that keeps the
    /// original message. Caller-facing kinds pass through untouched.
    pub fn wrap_internal(self, context: &str) -> Self {
        match self {
            TokenError::Provider(msg) | TokenError::Database(msg) | TokenError::Cipher(msg) => {
                TokenError::Internal(format!("{context}: {msg}"))
            }
            other => other,
        }
    }
}

impl From<sqlx::Error> for TokenError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        TokenError::Database(e.to_string())
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_report_internal() {
        assert_eq!(TokenError::Provider("boom".into()).code(), "internal");
        assert_eq!(TokenError::Database("boom".into()).code(), "internal");
        assert_eq!(TokenError::Cipher("boom".into()).code(), "internal");
        assert_eq!(
            TokenError::Database("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_caller_errors_keep_their_kind() {
        assert_eq!(TokenError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            TokenError::InvalidArgument("authCode is required".into()).code(),
            "invalid-argument"
        );
        assert_eq!(
            TokenError::FailedPrecondition("missing".into()).status(),
            StatusCode::PRECONDITION_FAILED
        );
    }

    #[test]
    fn test_wrap_internal_keeps_original_message() {
        let wrapped = TokenError::Provider("invalid_grant".into())
            .wrap_internal("Failed to exchange the token");
        assert_eq!(wrapped.code(), "internal");
        assert_eq!(wrapped.to_string(), "Failed to exchange the token: invalid_grant");

        let untouched = TokenError::Unauthenticated.wrap_internal("ignored");
        assert!(matches!(untouched, TokenError::Unauthenticated));
    }
}
