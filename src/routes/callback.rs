//! GET /auth/callback and GET /auth/confirm
//!
//! Every branch ends in a redirect: the landing page (or a relative `next`)
//! on success, the typed error page otherwise.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::Redirect;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::{self, Activity, Outcome, Protocol};
use crate::auth::AuthError;
use crate::guard::{LANDING_PATH, ServerClient};
use crate::provider::{OtpType, VerifyOtp};
use crate::routes::auth_error_redirect;
use crate::session::Session;
use crate::types::AuthErrorReason;

/// Query parameters of an OAuth redirect or an email confirmation link.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub otp_type: Option<String>,
    pub next: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn auth_callback(
    State(state): State<Arc<crate::AppState>>,
    ServerClient(client): ServerClient,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Redirect {
    let params = match params {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::warn!(error = %e, "malformed callback query");
            CallbackParams::default()
        }
    };
    let timeout = state.config.session_timeout;

    // Provider reported a failure before issuing a code.
    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        let message = params.error_description.as_deref().unwrap_or(error);
        audit::authentication_event(
            Activity::AuthTicket,
            Outcome::Failure(audit::SEVERITY_HIGH),
            None,
            Protocol::OAuth2,
            &format!("OAuth error: {error}"),
        );
        return auth_error_redirect(AuthErrorReason::CodeExchangeFailed, Some(message));
    }

    if let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) {
        let result = bounded(timeout, client.exchange_code_for_session(code)).await;
        return finish(
            result,
            Activity::AuthTicket,
            Protocol::OAuth2,
            AuthErrorReason::CodeExchangeFailed,
            params.next.as_deref(),
        );
    }

    if let (Some(token_hash), Some(otp_type)) = (
        params.token_hash.as_deref().filter(|t| !t.is_empty()),
        params.otp_type.as_deref().filter(|t| !t.is_empty()),
    ) {
        let Some(otp_type) = OtpType::parse(otp_type) else {
            tracing::warn!(otp_type, "unsupported verification type");
            return auth_error_redirect(
                AuthErrorReason::VerificationFailed,
                Some("unsupported verification type"),
            );
        };
        let verify = VerifyOtp {
            otp_type,
            token_hash: token_hash.to_string(),
        };
        let result = bounded(timeout, client.verify_otp(&verify)).await;
        return finish(
            result,
            Activity::Logon,
            Protocol::EmailOtp,
            AuthErrorReason::VerificationFailed,
            params.next.as_deref(),
        );
    }

    tracing::warn!("callback without code or token_hash");
    auth_error_redirect(AuthErrorReason::MissingToken, None)
}

async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(AuthError::Timeout(timeout)))
}

fn finish(
    result: Result<Session, AuthError>,
    activity: Activity,
    protocol: Protocol,
    failure: AuthErrorReason,
    next: Option<&str>,
) -> Redirect {
    match result {
        Ok(session) => {
            audit::authentication_event(
                activity,
                Outcome::Success,
                session.user.email.as_deref(),
                protocol,
                "Session established",
            );
            tracing::info!(user_id = %session.subject(), "signed in");
            Redirect::temporary(safe_next(next).unwrap_or(LANDING_PATH))
        }
        Err(AuthError::Timeout(after)) => {
            tracing::warn!(?after, "identity provider timed out during callback");
            audit::authentication_event(
                activity,
                Outcome::Failure(audit::SEVERITY_MEDIUM),
                None,
                protocol,
                "Identity provider timed out",
            );
            auth_error_redirect(AuthErrorReason::ServerError, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, reason = failure.as_str(), "callback failed");
            audit::authentication_event(
                activity,
                Outcome::Failure(audit::SEVERITY_MEDIUM),
                None,
                protocol,
                &format!("Session exchange failed: {e}"),
            );
            auth_error_redirect(failure, Some(&e.user_message()))
        }
    }
}

/// Accept only same-origin relative paths as a post-login target.
///
/// The target must also be usable as a `Location` header value.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.bytes().any(|b| b.is_ascii_control())
            && HeaderValue::from_str(n).is_ok()
    })
}
