//! Axum route guard layer.
//!
//! Builds the request's cookie adapter, runs the guard decision before any
//! handler, and writes queued cookies onto whatever response comes back.
//!
//! The per-request state reaches handlers through request extensions:
//! - `RequestCookies`: the shared cookie adapter for this request
//! - `CurrentSession`: the session the guard resolved, when there is one

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::GuardDecision;
use crate::AppState;
use crate::auth::AuthClient;
use crate::cookies::RequestCookies;
use crate::error::AppError;
use crate::routes::auth_error_redirect;
use crate::session::Session;
use crate::types::AuthErrorReason;

/// Session resolved by the guard for this request.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(AppError::NotAuthenticated)
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentSession>().cloned())
    }
}

/// Server auth client re-derived from the request's cookie adapter.
///
/// Auth-flow handlers only ever answer with redirects, so a request that
/// skipped the guard layer is sent to the error page with `server_error`.
pub struct ServerClient(pub AuthClient<RequestCookies>);

impl FromRequestParts<Arc<AppState>> for ServerClient {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(cookies) = parts.extensions.get::<RequestCookies>().cloned() else {
            tracing::error!(path = %parts.uri.path(), "route guard not configured");
            return Err(auth_error_redirect(AuthErrorReason::ServerError, None));
        };
        Ok(ServerClient(state.server_client(cookies)))
    }
}

/// Axum middleware function for the route guard.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookies = RequestCookies::from_headers(req.headers(), state.config.environment);
    let client = state.server_client(cookies.clone());

    let path = req.uri().path().to_string();
    let (decision, session) = state.guard.check(&path, &client).await;

    let mut response = match decision {
        GuardDecision::Redirect(target) => {
            tracing::debug!(path = %path, target = %target, "route guard redirect");
            Redirect::temporary(&target).into_response()
        }
        GuardDecision::Passthrough => {
            req.extensions_mut().insert(cookies.clone());
            if let Some(session) = session {
                req.extensions_mut().insert(CurrentSession(session));
            }
            next.run(req).await
        }
    };

    // Refreshed or cleared sessions must reach the browser on redirects too.
    cookies.apply(&mut response).await;
    response
}
