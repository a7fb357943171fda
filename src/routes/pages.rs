//! Page routes: sign-in, sign-up, the protected landing page and the
//! typed auth error page.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::Deserialize;
use std::sync::Arc;

use crate::guard::{CurrentSession, DevBypass};
use crate::types::{AuthErrorPage, AuthErrorReason, DashboardResponse, SignInPage};

const OAUTH_START_PATH: &str = "/auth/oauth";

/// Longest provider message echoed back on the error page.
const MAX_MESSAGE_LEN: usize = 500;

pub async fn sign_in(State(state): State<Arc<crate::AppState>>) -> Json<SignInPage> {
    Json(SignInPage {
        page: "signin",
        providers: state.config.oauth_providers.clone(),
        oauth_path: OAUTH_START_PATH,
    })
}

pub async fn sign_up(State(state): State<Arc<crate::AppState>>) -> Json<SignInPage> {
    Json(SignInPage {
        page: "signup",
        providers: state.config.oauth_providers.clone(),
        oauth_path: OAUTH_START_PATH,
    })
}

/// Protected landing page. The session is absent only under the
/// development bypass.
pub async fn dashboard(
    State(state): State<Arc<crate::AppState>>,
    session: Option<CurrentSession>,
) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        user: session.map(|CurrentSession(s)| s.user.into()),
        dev_bypass: state.guard.bypass() == DevBypass::Enabled,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthErrorParams {
    pub reason: Option<String>,
    pub message: Option<String>,
}

pub async fn auth_error(
    params: Result<Query<AuthErrorParams>, QueryRejection>,
) -> Json<AuthErrorPage> {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let reason = AuthErrorReason::parse_lossy(params.reason.as_deref());
    let message = params
        .message
        .filter(|m| !m.is_empty())
        .map(|m| m.chars().take(MAX_MESSAGE_LEN).collect())
        .unwrap_or_else(|| reason.description().to_string());
    Json(AuthErrorPage { reason, message })
}
