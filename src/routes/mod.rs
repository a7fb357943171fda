//! HTTP route handlers.

pub mod callback;
pub mod health;
pub mod logout;
pub mod me;
pub mod oauth;
pub mod pages;

use axum::response::Redirect;

use crate::guard::AUTH_ERROR_PATH;
use crate::types::AuthErrorReason;

/// Redirect to the typed auth error page, carrying the provider's message
/// when there is one.
pub fn auth_error_redirect(reason: AuthErrorReason, message: Option<&str>) -> Redirect {
    let mut target = format!("{}?reason={}", AUTH_ERROR_PATH, reason.as_str());
    if let Some(message) = message.filter(|m| !m.is_empty()) {
        target.push_str("&message=");
        target.push_str(&urlencoding::encode(message));
    }
    Redirect::temporary(&target)
}
