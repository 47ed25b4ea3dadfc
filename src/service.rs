//! Google Calendar token handlers.
//!
//! Each operation authenticates the caller, validates its input, talks to the
//! OAuth client at most once and merges the outcome into the caller's record.
//! Failures are logged here and returned; nothing is retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{Authenticator, CallerIdentity};
use crate::error::TokenError;
use crate::providers::OAuthClient;
use crate::store::record::{
    compute_expires_in, serialize_opt_timestamp, serialize_timestamp, DEFAULT_SCOPE,
    DEFAULT_TOKEN_TYPE,
};
use crate::store::{TokenPatch, TokenStore};

const MISSING_CREDENTIALS: &str = "Google client ID or client secret is not configured";

#[derive(Debug, Default, Deserialize)]
pub struct ExchangeRequest {
    #[serde(rename = "authCode", default)]
    pub auth_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub success: bool,
    pub message: String,
    /// Echoed for confirmation only; the stored record is authoritative.
    pub access_token: String,
    pub expires_in: i64,
    #[serde(rename = "fechaObtencion", serialize_with = "serialize_timestamp")]
    pub obtained_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(rename = "fechaActualizacion", serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(
        rename = "fechaObtencion",
        serialize_with = "serialize_opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub obtained_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "fechaActualizacion",
        serialize_with = "serialize_opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub deleted: bool,
}

/// The token handlers with their collaborators injected.
pub struct TokenService {
    authenticator: Arc<dyn Authenticator>,
    /// `None` when the deployment has no Google client credentials.
    oauth: Option<Arc<dyn OAuthClient>>,
    store: Arc<dyn TokenStore>,
}

impl TokenService {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        oauth: Option<Arc<dyn OAuthClient>>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            authenticator,
            oauth,
            store,
        }
    }

    /// Verify the caller without touching any stored tokens.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, TokenError> {
        self.authenticator.authenticate(bearer).await
    }

    /// Exchange a one-time authorization code and store the resulting tokens.
    pub async fn exchange(
        &self,
        bearer: Option<&str>,
        req: ExchangeRequest,
    ) -> Result<ExchangeResponse, TokenError> {
        self.exchange_inner(bearer, req).await.inspect_err(|e| {
            error!("Failed to exchange Google token: {e}");
        })
    }

    async fn exchange_inner(
        &self,
        bearer: Option<&str>,
        req: ExchangeRequest,
    ) -> Result<ExchangeResponse, TokenError> {
        let caller = self.authenticator.authenticate(bearer).await?;
        let auth_code = required(req.auth_code, "authCode is required")?;
        let oauth = self.oauth_client()?;

        let tokens = oauth
            .exchange_code(&auth_code)
            .await
            .map_err(|e| e.wrap_internal("Failed to exchange the token"))?;

        let access_token = tokens
            .access_token
            .clone()
            .ok_or_else(|| TokenError::Internal("Could not obtain the access_token".into()))?;

        let now = Utc::now();
        let expires_in = compute_expires_in(&tokens, now);
        let patch = TokenPatch {
            access_token: Some(access_token.clone()),
            token_type: Some(
                tokens
                    .token_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            ),
            expires_in: Some(expires_in),
            refresh_token: tokens.refresh_token.clone(),
            scope: Some(tokens.scope.clone().unwrap_or_else(|| DEFAULT_SCOPE.to_string())),
            obtained_at: Some(now),
            updated_at: Some(now),
        };

        self.store
            .merge(&caller.uid, &patch)
            .await
            .map_err(|e| e.wrap_internal("Failed to exchange the token"))?;

        info!(
            uid = %caller.uid,
            provider = oauth.id(),
            has_refresh_token = tokens.refresh_token.is_some(),
            "Stored Google Calendar token"
        );

        Ok(ExchangeResponse {
            success: true,
            message: "Token stored successfully".into(),
            access_token,
            expires_in,
            obtained_at: now,
        })
    }

    /// Mint a new access token and merge it into the stored record.
    pub async fn refresh(
        &self,
        bearer: Option<&str>,
        req: RefreshRequest,
    ) -> Result<RefreshResponse, TokenError> {
        self.refresh_inner(bearer, req).await.inspect_err(|e| {
            error!("Failed to refresh Google token: {e}");
        })
    }

    async fn refresh_inner(
        &self,
        bearer: Option<&str>,
        req: RefreshRequest,
    ) -> Result<RefreshResponse, TokenError> {
        let caller = self.authenticator.authenticate(bearer).await?;
        let supplied_refresh = required(req.refresh_token, "refreshToken is required")?;
        let oauth = self.oauth_client()?;

        let tokens = oauth
            .refresh_token(&supplied_refresh)
            .await
            .map_err(|e| e.wrap_internal("Failed to refresh the token"))?;

        let access_token = tokens
            .access_token
            .clone()
            .ok_or_else(|| TokenError::Internal("Could not refresh the access_token".into()))?;

        let existing = self
            .store
            .get(&caller.uid)
            .await
            .map_err(|e| e.wrap_internal("Failed to refresh the token"))?;

        // Provider-issued first, then whatever is stored, then the caller's copy.
        let refresh_token = tokens
            .refresh_token
            .clone()
            .or_else(|| existing.as_ref().and_then(|r| r.refresh_token.clone()))
            .unwrap_or(supplied_refresh);

        let now = Utc::now();
        let token_type = tokens
            .token_type
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());
        let expires_in = compute_expires_in(&tokens, now);

        let patch = TokenPatch {
            access_token: Some(access_token.clone()),
            token_type: Some(token_type.clone()),
            expires_in: Some(expires_in),
            refresh_token: Some(refresh_token),
            updated_at: Some(now),
            ..Default::default()
        };

        self.store
            .merge(&caller.uid, &patch)
            .await
            .map_err(|e| e.wrap_internal("Failed to refresh the token"))?;

        info!(
            uid = %caller.uid,
            provider = oauth.id(),
            had_record = existing.is_some(),
            "Refreshed Google Calendar token"
        );

        Ok(RefreshResponse {
            access_token,
            token_type,
            expires_in,
            updated_at: now,
        })
    }

    /// Whether the caller has a stored Google Calendar token.
    pub async fn status(&self, bearer: Option<&str>) -> Result<StatusResponse, TokenError> {
        let caller = self.authenticator.authenticate(bearer).await?;
        let record = self
            .store
            .get(&caller.uid)
            .await
            .map_err(|e| e.wrap_internal("Failed to read the token"))
            .inspect_err(|e| error!("Failed to read Google token status: {e}"))?;

        Ok(match record.filter(|r| !r.access_token.is_empty()) {
            Some(r) => StatusResponse {
                connected: true,
                expired: Some(r.is_expired(Utc::now())),
                expires_in: Some(r.expires_in),
                obtained_at: r.obtained_at,
                updated_at: Some(r.updated_at),
            },
            None => StatusResponse {
                connected: false,
                expired: None,
                expires_in: None,
                obtained_at: None,
                updated_at: None,
            },
        })
    }

    /// Forget the caller's Google Calendar tokens.
    pub async fn disconnect(&self, bearer: Option<&str>) -> Result<DisconnectResponse, TokenError> {
        let caller = self.authenticator.authenticate(bearer).await?;
        let deleted = self
            .store
            .delete(&caller.uid)
            .await
            .map_err(|e| e.wrap_internal("Failed to delete the token"))
            .inspect_err(|e| error!("Failed to delete Google token: {e}"))?;

        info!(uid = %caller.uid, deleted, "Disconnected Google Calendar");
        Ok(DisconnectResponse { deleted })
    }

    fn oauth_client(&self) -> Result<&dyn OAuthClient, TokenError> {
        self.oauth
            .as_deref()
            .ok_or_else(|| TokenError::FailedPrecondition(MISSING_CREDENTIALS.into()))
    }
}

fn required(value: Option<String>, message: &str) -> Result<String, TokenError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TokenError::InvalidArgument(message.into()))
}
