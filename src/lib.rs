//! Agent dashboard auth: session bridge and route guard for a
//! Supabase-backed dashboard.
//!
//! One Axum router fronts the dashboard pages. Every request passes the
//! route guard, which resolves the session from cookies and decides
//! between redirect and passthrough.

pub mod audit;
pub mod auth;
pub mod config;
pub mod cookies;
pub mod error;
pub mod guard;
pub mod provider;
pub mod routes;
pub mod session;
pub mod types;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthClient, ClientSettings, create_server_client};
use crate::config::Config;
use crate::cookies::RequestCookies;
use crate::guard::{RouteGuard, route_guard};
use crate::types::AuthErrorReason;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub settings: Arc<ClientSettings>,
    pub guard: RouteGuard,
}

impl AppState {
    pub fn new(config: Config, http_client: reqwest::Client) -> Self {
        let settings = Arc::new(ClientSettings::from_config(&config));
        let guard = RouteGuard::from_config(&config);
        Self {
            config,
            http_client,
            settings,
            guard,
        }
    }

    /// Server auth client over this request's cookies.
    pub fn server_client(&self, cookies: RequestCookies) -> AuthClient<RequestCookies> {
        create_server_client(self.settings.clone(), self.http_client.clone(), cookies)
    }
}

/// Build the Axum router with all middleware and routes.
pub fn create_app(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/callback", get(routes::callback::auth_callback))
        .route("/confirm", get(routes::callback::auth_callback))
        .route("/oauth", get(routes::oauth::start_oauth))
        .route("/signout", post(routes::logout::sign_out))
        .route("/auth-error", get(routes::pages::auth_error));

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/signin", get(routes::pages::sign_in))
        .route("/signup", get(routes::pages::sign_up))
        .route("/dashboard", get(routes::pages::dashboard))
        .route("/dashboard/{*rest}", get(routes::pages::dashboard))
        .route("/api/user", get(routes::me::current_user))
        .nest("/auth", auth_routes)
        .layer(from_fn_with_state(state.clone(), route_guard))
        .layer(CatchPanicLayer::custom(panic_redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Outermost boundary: a panic becomes a redirect to the generic error
/// state, never a raw 500.
fn panic_redirect(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "request handler panicked");
    routes::auth_error_redirect(AuthErrorReason::ServerError, None).into_response()
}
