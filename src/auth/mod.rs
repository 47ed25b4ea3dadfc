pub mod verify;

pub use verify::{FirebaseAuthenticator, JwksKeyStore};

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::TokenError;

/// The verified subject of an inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity {
    /// Firebase user ID; the key of the caller's token record.
    pub uid: String,
    pub email: Option<String>,
}

/// Seam over the external identity platform.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve a bearer credential to a caller. Missing or invalid credentials
    /// yield [`TokenError::Unauthenticated`].
    async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, TokenError>;
}

/// Fixed bearer → UID table, for tests and local tooling.
#[derive(Default)]
pub struct StaticAuthenticator {
    callers: HashMap<String, String>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caller(mut self, bearer: &str, uid: &str) -> Self {
        self.callers.insert(bearer.to_string(), uid.to_string());
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, TokenError> {
        bearer
            .and_then(|b| self.callers.get(b))
            .map(|uid| CallerIdentity {
                uid: uid.clone(),
                email: None,
            })
            .ok_or(TokenError::Unauthenticated)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer   ")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn test_static_authenticator() {
        let auth = StaticAuthenticator::new().with_caller("token-a", "uid-a");
        assert_eq!(auth.authenticate(Some("token-a")).await.unwrap().uid, "uid-a");
        assert!(auth.authenticate(Some("token-b")).await.is_err());
        assert!(auth.authenticate(None).await.is_err());
    }
}
