mod google;
mod traits;

pub use google::GoogleOAuthClient;
pub use traits::{OAuthClient, TokenSet};

use std::sync::Arc;

use crate::config::Config;

/// Build the Google client when credentials are configured.
pub fn google_client(config: &Config) -> Option<Arc<dyn OAuthClient>> {
    let credentials = config.google_credentials()?;
    let client = GoogleOAuthClient::new(credentials)
        .with_redirect_uri(config.google_redirect_uri.clone())
        .with_token_url(config.google_token_url.clone());
    Some(Arc::new(client))
}
