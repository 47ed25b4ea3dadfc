use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use calendar_tokens::auth::{Authenticator, FirebaseAuthenticator, JwksKeyStore};
use calendar_tokens::config::Config;
use calendar_tokens::crypto::TokenCipher;
use calendar_tokens::service::TokenService;
use calendar_tokens::store::PgTokenStore;
use calendar_tokens::{api, providers, AppState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calendar_tokens=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    config.require_google_credentials()?;
    info!("calendar-tokens v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    let cipher = TokenCipher::from_optional_key(config.token_encryption_key.as_deref())?;
    if !cipher.is_enabled() {
        tracing::warn!("TOKEN_ENCRYPTION_KEY not set; tokens are stored unencrypted");
    }

    let store = PgTokenStore::new(&config.database_url, cipher).await?;
    store.migrate().await?;
    info!("Database connected and migrated ✓");

    let authenticator: Arc<dyn Authenticator> = if config.auth_insecure_decode {
        tracing::warn!("AUTH_INSECURE_DECODE is set; ID token signatures are NOT verified");
        Arc::new(FirebaseAuthenticator::insecure(&config.firebase_project_id))
    } else {
        let jwks = JwksKeyStore::new(&config.firebase_jwks_url);
        match jwks.warm_cache().await {
            Ok(()) => info!("JWKS keys cached ✓"),
            Err(e) => tracing::warn!(
                "Failed to fetch JWKS keys: {e}. Verification will retry on first request."
            ),
        }
        Arc::new(FirebaseAuthenticator::new(&config.firebase_project_id, jwks))
    };

    let oauth = providers::google_client(&config);
    if let Some(client) = &oauth {
        info!("Google OAuth client ready (redirect URI {})", client.redirect_uri());
    }

    let state: SharedState = Arc::new(AppState {
        tokens: TokenService::new(authenticator, oauth, Arc::new(store)),
    });

    let app = api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
