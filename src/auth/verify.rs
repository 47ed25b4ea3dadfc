//! Caller verification for Firebase Auth ID tokens.
//!
//! The mobile app signs in with Firebase and sends its ID token as a bearer
//! credential. Tokens are RS256 JWTs signed by Google's securetoken service,
//! with `aud` set to the Firebase project ID and `sub` set to the user's UID.

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{Authenticator, CallerIdentity};
use crate::error::TokenError;

// ─────────────────────────────────────────────────────────────────────────────
// JWKS Cache: fetches and caches the securetoken signing keys
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Clone)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Deserialize, Clone)]
struct JwkKey {
    kid: String,
    kty: String,
    n: String, // RSA modulus
    e: String, // RSA exponent
}

struct JwksCache {
    keys: Vec<JwkKey>,
    fetched_at: std::time::Instant,
}

/// Thread-safe JWKS key cache
pub struct JwksKeyStore {
    cache: RwLock<Option<JwksCache>>,
    jwks_url: String,
    /// How long to cache JWKS keys (default 1 hour)
    cache_ttl: std::time::Duration,
    http: reqwest::Client,
}

impl JwksKeyStore {
    pub fn new(jwks_url: &str) -> Self {
        Self {
            cache: RwLock::new(None),
            jwks_url: jwks_url.to_string(),
            cache_ttl: std::time::Duration::from_secs(3600),
            http: reqwest::Client::new(),
        }
    }

    /// Get the decoding key for a specific kid, fetching/refreshing JWKS as needed
    async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    if let Some(key) = cached.keys.iter().find(|k| k.kid == kid) {
                        return Self::jwk_to_decoding_key(key);
                    }
                }
            }
        }

        // Cache miss or expired: Google rotates keys, so refetch once
        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        if let Some(ref cached) = *cache {
            if let Some(key) = cached.keys.iter().find(|k| k.kid == kid) {
                return Self::jwk_to_decoding_key(key);
            }
        }

        tracing::warn!("No JWKS key found for kid '{kid}'");
        Err(TokenError::Unauthenticated)
    }

    async fn refresh_keys(&self) -> Result<(), TokenError> {
        tracing::info!("Fetching JWKS keys from {}", self.jwks_url);

        let resp = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| TokenError::Internal(format!("JWKS fetch failed: {e}")))?;

        let jwks: JwksResponse = resp
            .json()
            .await
            .map_err(|e| TokenError::Internal(format!("JWKS parse failed: {e}")))?;

        tracing::info!("Cached {} JWKS keys", jwks.keys.len());

        let mut cache = self.cache.write().await;
        *cache = Some(JwksCache {
            keys: jwks.keys,
            fetched_at: std::time::Instant::now(),
        });

        Ok(())
    }

    fn jwk_to_decoding_key(key: &JwkKey) -> Result<DecodingKey, TokenError> {
        if key.kty != "RSA" {
            tracing::warn!("Unsupported JWKS key type: {}", key.kty);
            return Err(TokenError::Unauthenticated);
        }

        DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| TokenError::Internal(format!("invalid RSA key components: {e}")))
    }

    /// Pre-warm the cache on startup
    pub async fn warm_cache(&self) -> Result<(), TokenError> {
        self.refresh_keys().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Firebase ID token validation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    iss: String,
    aud: String,
    sub: String,
    exp: i64,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    kid: Option<String>,
    alg: Option<String>,
}

/// Verifies Firebase ID tokens for one project.
pub struct FirebaseAuthenticator {
    project_id: String,
    /// `None` disables signature checks (local development only).
    jwks: Option<JwksKeyStore>,
}

impl FirebaseAuthenticator {
    pub fn new(project_id: &str, jwks: JwksKeyStore) -> Self {
        Self {
            project_id: project_id.to_string(),
            jwks: Some(jwks),
        }
    }

    /// Decode-only verification: checks claims but NOT the signature.
    pub fn insecure(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            jwks: None,
        }
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn verify_token(&self, id_token: &str) -> Result<CallerIdentity, TokenError> {
        let parts: Vec<&str> = id_token.split('.').collect();
        if parts.len() != 3 {
            return Err(rejected("invalid JWT format"));
        }

        let claims = match &self.jwks {
            Some(jwks) => self.verify_signed(id_token, parts[0], jwks).await?,
            None => self.decode_unverified(parts[1])?,
        };

        if claims.sub.is_empty() {
            return Err(rejected("ID token has an empty subject"));
        }

        Ok(CallerIdentity {
            uid: claims.sub,
            email: claims.email,
        })
    }

    async fn verify_signed(
        &self,
        id_token: &str,
        header_b64: &str,
        jwks: &JwksKeyStore,
    ) -> Result<FirebaseClaims, TokenError> {
        let header_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| rejected("invalid base64 in JWT header"))?;

        let header: JwtHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| rejected(&format!("invalid JWT header: {e}")))?;

        if header.alg.as_deref() != Some("RS256") {
            return Err(rejected("unsupported JWT algorithm (expected RS256)"));
        }

        let kid = header
            .kid
            .ok_or_else(|| rejected("JWT header missing 'kid'"))?;

        let decoding_key = jwks.get_decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer()]);
        validation.set_audience(&[&self.project_id]);
        validation.validate_exp = true;

        let token_data = decode::<FirebaseClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| rejected(&format!("JWT verification failed: {e}")))?;

        Ok(token_data.claims)
    }

    fn decode_unverified(&self, payload_b64: &str) -> Result<FirebaseClaims, TokenError> {
        tracing::warn!("ID token signature verification DISABLED; do not run this in production");

        let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| rejected("invalid base64 in JWT"))?;

        let claims: FirebaseClaims = serde_json::from_slice(&payload_bytes)
            .map_err(|e| rejected(&format!("invalid JWT payload: {e}")))?;

        if claims.exp < Utc::now().timestamp() {
            return Err(rejected("ID token expired"));
        }
        if claims.iss != self.issuer() {
            return Err(rejected("invalid issuer"));
        }
        if claims.aud != self.project_id {
            return Err(rejected("invalid audience"));
        }

        Ok(claims)
    }
}

#[async_trait]
impl Authenticator for FirebaseAuthenticator {
    async fn authenticate(&self, bearer: Option<&str>) -> Result<CallerIdentity, TokenError> {
        let token = bearer
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::Unauthenticated)?;
        self.verify_token(token).await
    }
}

fn rejected(reason: &str) -> TokenError {
    tracing::warn!("Rejected ID token: {reason}");
    TokenError::Unauthenticated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROJECT: &str = "mimedicinaapp";

    fn b64(value: serde_json::Value) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(value.to_string())
    }

    fn id_token(header: serde_json::Value, claims: serde_json::Value) -> String {
        format!("{}.{}.c2ln", b64(header), b64(claims))
    }

    fn claims(aud: &str, exp_offset: i64) -> serde_json::Value {
        json!({
            "iss": format!("https://securetoken.google.com/{aud}"),
            "aud": aud,
            "sub": "uid-123",
            "email": "paciente@example.com",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + exp_offset,
        })
    }

    #[tokio::test]
    async fn test_missing_bearer_is_unauthenticated() {
        let auth = FirebaseAuthenticator::insecure(PROJECT);
        assert!(matches!(
            auth.authenticate(None).await,
            Err(TokenError::Unauthenticated)
        ));
        assert!(matches!(
            auth.authenticate(Some("")).await,
            Err(TokenError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_insecure_mode_reads_uid_from_claims() {
        let auth = FirebaseAuthenticator::insecure(PROJECT);
        let token = id_token(json!({"alg": "RS256", "kid": "k1"}), claims(PROJECT, 3600));

        let caller = auth.authenticate(Some(&token)).await.unwrap();
        assert_eq!(caller.uid, "uid-123");
        assert_eq!(caller.email.as_deref(), Some("paciente@example.com"));
    }

    #[tokio::test]
    async fn test_insecure_mode_still_checks_expiry_and_audience() {
        let auth = FirebaseAuthenticator::insecure(PROJECT);

        let expired = id_token(json!({"alg": "RS256"}), claims(PROJECT, -60));
        assert!(auth.authenticate(Some(&expired)).await.is_err());

        let other_project = id_token(json!({"alg": "RS256"}), claims("other-app", 3600));
        assert!(auth.authenticate(Some(&other_project)).await.is_err());

        assert!(auth.authenticate(Some("not-a-jwt")).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_non_rs256_before_fetching_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .expect(0)
            .mount(&server)
            .await;

        let auth = FirebaseAuthenticator::new(
            PROJECT,
            JwksKeyStore::new(&format!("{}/jwks", server.uri())),
        );
        let token = id_token(json!({"alg": "HS256", "kid": "k1"}), claims(PROJECT, 3600));

        assert!(matches!(
            auth.authenticate(Some(&token)).await,
            Err(TokenError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = FirebaseAuthenticator::new(
            PROJECT,
            JwksKeyStore::new(&format!("{}/jwks", server.uri())),
        );
        let token = id_token(json!({"alg": "RS256", "kid": "rotated"}), claims(PROJECT, 3600));

        assert!(matches!(
            auth.authenticate(Some(&token)).await,
            Err(TokenError::Unauthenticated)
        ));
    }
}
