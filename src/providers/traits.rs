use async_trait::async_trait;

use crate::error::TokenError;

/// Tokens returned from the provider after a code exchange or refresh.
///
/// Every field is optional because providers (and their client libraries)
/// differ in what they send back: Google's token endpoint reports a relative
/// `expires_in`, while some clients surface an absolute `expiry_date`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    /// Seconds until the access token expires.
    pub expires_in: Option<i64>,
    /// Absolute expiry as epoch milliseconds.
    pub expiry_date: Option<i64>,
    pub scope: Option<String>,
}

/// Seam over the OAuth token endpoint.
///
/// Implementations make exactly one attempt per call. Retry policy belongs to
/// the mobile client.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Provider identifier (e.g. "google"), used in logs.
    fn id(&self) -> &str;

    /// The redirect URI the authorization code must have been issued against.
    fn redirect_uri(&self) -> &str;

    /// Exchange a one-time authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, TokenError>;

    /// Mint a new access token from a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, TokenError>;
}
