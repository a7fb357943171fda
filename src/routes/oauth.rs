//! GET /auth/oauth

use axum::extract::{Query, State};
use axum::extract::rejection::QueryRejection;
use axum::response::Redirect;
use serde::Deserialize;
use std::sync::Arc;

use crate::guard::{SIGN_IN_PATH, ServerClient};
use crate::provider::OAuthSignIn;
use crate::routes::auth_error_redirect;
use crate::types::AuthErrorReason;

#[derive(Debug, Default, Deserialize)]
pub struct OAuthParams {
    pub provider: Option<String>,
    pub scopes: Option<String>,
}

/// Store a PKCE verifier cookie and send the browser to the provider.
pub async fn start_oauth(
    State(state): State<Arc<crate::AppState>>,
    ServerClient(client): ServerClient,
    params: Result<Query<OAuthParams>, QueryRejection>,
) -> Redirect {
    let params = params.map(|Query(p)| p).unwrap_or_default();

    let Some(provider) = params
        .provider
        .filter(|p| state.config.oauth_providers.iter().any(|known| known == p))
    else {
        return Redirect::temporary(SIGN_IN_PATH);
    };

    let sign_in = OAuthSignIn {
        provider,
        redirect_to: state.config.callback_url(),
        scopes: params.scopes,
    };

    match client.sign_in_with_oauth(&sign_in).await {
        Ok(redirect) => {
            tracing::debug!(provider = %redirect.provider, "starting OAuth sign-in");
            Redirect::temporary(&redirect.url)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not start OAuth sign-in");
            auth_error_redirect(AuthErrorReason::ServerError, None)
        }
    }
}
