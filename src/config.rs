use anyhow::{Context, Result};

/// Redirect URI registered with Google for the mobile app's server auth code.
/// Codes obtained against any other redirect URI fail to exchange.
pub const DEFAULT_REDIRECT_URI: &str = "https://mimedicinaapp.firebaseapp.com/googlecalendar/callback";

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Public keys that sign Firebase Auth ID tokens.
pub const DEFAULT_FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,
    /// 32-byte base64-encoded key for AES-256-GCM encryption of stored tokens.
    /// Tokens are stored in plaintext when unset.
    pub token_encryption_key: Option<String>,

    // ── Caller identity ─────────────────────────────────────────────────
    pub firebase_project_id: String,
    pub firebase_jwks_url: String,
    /// Skip ID-token signature verification. Local development only.
    pub auth_insecure_decode: bool,

    // ── Google OAuth ────────────────────────────────────────────────────
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: String,
    pub google_token_url: String,
}

/// Client credentials for the Google OAuth app.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8420".into())
                .parse()
                .context("Invalid PORT")?,

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            token_encryption_key: non_empty_var("TOKEN_ENCRYPTION_KEY"),

            firebase_project_id: std::env::var("FIREBASE_PROJECT_ID")
                .context("FIREBASE_PROJECT_ID is required to verify caller ID tokens")?,
            firebase_jwks_url: std::env::var("FIREBASE_JWKS_URL")
                .unwrap_or_else(|_| DEFAULT_FIREBASE_JWKS_URL.into()),
            auth_insecure_decode: std::env::var("AUTH_INSECURE_DECODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            google_client_id: non_empty_var("GOOGLE_CLIENT_ID"),
            google_client_secret: non_empty_var("GOOGLE_CLIENT_SECRET"),
            google_redirect_uri: std::env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.into()),
            google_token_url: std::env::var("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.into()),
        })
    }

    /// Google client credentials, if both halves are configured.
    pub fn google_credentials(&self) -> Option<GoogleCredentials> {
        match (&self.google_client_id, &self.google_client_secret) {
            (Some(id), Some(secret)) => Some(GoogleCredentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        }
    }

    /// Startup check: the service is useless without Google credentials.
    pub fn require_google_credentials(&self) -> Result<GoogleCredentials> {
        self.google_credentials()
            .context("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are required")
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
