//! Local server entrypoint.
//!
//! Production logs JSON lines; development logs the human format and loads
//! `.env` first.

use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use agent_dashboard_auth::config::{Config, Environment};
use agent_dashboard_auth::{AppState, create_app};

#[tokio::main]
async fn main() {
    // APP_ENV may itself come from .env, so load it before deciding.
    let _ = dotenvy::dotenv();
    let production = std::env::var("APP_ENV")
        .map(|v| !matches!(v.as_str(), "development" | "dev"))
        .unwrap_or(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if production {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env().expect("Failed to load configuration");
    if config.environment == Environment::Production && config.cookie_secret == "change-me-in-production" {
        tracing::warn!("COOKIE_SECRET is the built-in default; set it in production");
    }
    if config.dev_bypass {
        tracing::warn!("Development auth bypass is enabled for protected routes");
    }

    let http_client = reqwest::Client::builder()
        .timeout(config.session_timeout)
        .build()
        .expect("Failed to build HTTP client");

    let state = Arc::new(AppState::new(config.clone(), http_client));
    let app = create_app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(environment = config.environment.as_str(), "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
