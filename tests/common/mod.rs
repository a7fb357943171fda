//! Test utilities: config and app builders, HS256 token factory, sealed
//! session cookies, wiremock provider responses.

#![allow(dead_code)]

use agent_dashboard_auth::auth::storage;
use agent_dashboard_auth::config::{Config, Environment};
use agent_dashboard_auth::session::{Session, User};
use agent_dashboard_auth::{AppState, create_app};
use axum::body::Body;
use axum::http::{Request, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use wiremock::MockServer;

pub const JWT_SECRET: &str = "test-jwt-secret";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Config pointing at a wiremock provider.
pub fn test_config(server: &MockServer, environment: Environment) -> Config {
    let mut config = Config::test_default();
    config.supabase_url = server.uri();
    config.environment = environment;
    config.dev_bypass = environment == Environment::Development;
    config.session_timeout = Duration::from_secs(2);
    config
}

/// Same, with local access-token verification enabled.
pub fn test_config_with_jwt(server: &MockServer, environment: Environment) -> Config {
    let mut config = test_config(server, environment);
    config.supabase_jwt_secret = Some(JWT_SECRET.into());
    config
}

pub fn build_test_app(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, reqwest::Client::new()));
    let app = create_app(state.clone());
    (app, state)
}

/// HS256 access token as GoTrue would issue it.
pub fn access_token(sub: &str, exp: u64) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": sub,
            "aud": "authenticated",
            "role": "authenticated",
            "email": format!("{sub}@example.com"),
            "exp": exp,
        }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn test_session(sub: &str, access_token: String, refresh_token: &str, expires_at: u64) -> Session {
    Session {
        access_token,
        refresh_token: refresh_token.into(),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at: Some(expires_at),
        user: User {
            id: sub.into(),
            email: Some(format!("{sub}@example.com")),
            role: Some("authenticated".into()),
            aud: Some("authenticated".into()),
            ..User::default()
        },
    }
}

/// Live session whose access token verifies against [`JWT_SECRET`].
pub fn valid_session(sub: &str) -> Session {
    let exp = now() + 3600;
    test_session(sub, access_token(sub, exp), "rt-valid", exp)
}

/// `Cookie` header carrying the sealed session.
pub fn session_cookie(config: &Config, session: &Session) -> String {
    let sealed = storage::seal(config.cookie_secret.as_bytes(), session).unwrap();
    format!("{}={}", config.storage_key(), sealed)
}

/// GoTrue token endpoint response body.
pub fn token_response(sub: &str, access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh_token,
        "user": {
            "id": sub,
            "aud": "authenticated",
            "role": "authenticated",
            "email": format!("{sub}@example.com")
        }
    })
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect()
}

/// The `Set-Cookie` line for `name`, if the response wrote one.
pub fn set_cookie_for(response: &axum::response::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|line| line.starts_with(&prefix))
}

/// Value part of a `Set-Cookie` line.
pub fn cookie_value(line: &str) -> &str {
    line.split(';')
        .next()
        .and_then(|kv| kv.split_once('='))
        .map(|(_, v)| v)
        .unwrap_or_default()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
