use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{OAuthClient, TokenSet};
use crate::config::{GoogleCredentials, DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_URL};
use crate::error::TokenError;

/// Google OAuth 2.0 client for the Calendar integration.
///
/// Token lifetime: 1 hour.
/// Refresh: Google usually omits `refresh_token` from refresh responses, so the
/// caller is responsible for keeping the one it already has.
pub struct GoogleOAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    http: reqwest::Client,
}

// Raw token response from Google's token endpoint
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

// Error body from Google's token endpoint, e.g. {"error":"invalid_grant","error_description":"Bad Request"}
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl GoogleOAuthClient {
    pub fn new(credentials: GoogleCredentials) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn post_token_request(
        &self,
        form: &[(&str, &str)],
        action: &str,
    ) -> Result<TokenSet, TokenError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| TokenError::Provider(format!("{action} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TokenError::Provider(describe_failure(action, status, &body)));
        }

        let token_resp: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| TokenError::Provider(format!("Failed to parse {action} response: {e}")))?;

        Ok(TokenSet {
            access_token: token_resp.access_token.filter(|t| !t.is_empty()),
            refresh_token: token_resp.refresh_token.filter(|t| !t.is_empty()),
            token_type: token_resp.token_type,
            expires_in: token_resp.expires_in,
            expiry_date: None,
            scope: token_resp.scope,
        })
    }
}

#[async_trait]
impl OAuthClient for GoogleOAuthClient {
    fn id(&self) -> &str {
        "google"
    }

    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, TokenError> {
        self.post_token_request(
            &[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_uri),
                ("grant_type", "authorization_code"),
            ],
            "token exchange",
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, TokenError> {
        self.post_token_request(
            &[
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "refresh_token"),
            ],
            "token refresh",
        )
        .await
    }
}

fn describe_failure(action: &str, status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GoogleErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(desc) => format!("Google {action} failed ({status}): {} ({desc})", err.error),
            None => format!("Google {action} failed ({status}): {}", err.error),
        },
        Err(_) => format!("Google {action} failed ({status}): {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleOAuthClient {
        GoogleOAuthClient::new(GoogleCredentials {
            client_id: "client-123".into(),
            client_secret: "secret-456".into(),
        })
        .with_token_url(format!("{}/token", server.uri()))
    }

    #[tokio::test]
    async fn test_exchange_code_posts_authorization_code_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_id=client-123"))
            .and(body_string_contains(
                "redirect_uri=https%3A%2F%2Fmimedicinaapp.firebaseapp.com%2Fgooglecalendar%2Fcallback",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT1",
                "refresh_token": "RT1",
                "token_type": "Bearer",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/calendar.events"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client(&server).exchange_code("abc").await.unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("AT1"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("RT1"));
        assert_eq!(tokens.expires_in, Some(3599));
        assert_eq!(tokens.expiry_date, None);
    }

    #[tokio::test]
    async fn test_refresh_without_new_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=RT1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT2",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = client(&server).refresh_token("RT1").await.unwrap();
        assert_eq!(tokens.access_token.as_deref(), Some("AT2"));
        assert_eq!(tokens.refresh_token, None);
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_google_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let err = client(&server).exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, TokenError::Provider(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_empty_access_token_is_treated_as_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let tokens = client(&server).exchange_code("abc").await.unwrap();
        assert_eq!(tokens.access_token, None);
    }
}
