//! Shared request/response DTOs.

use serde::{Deserialize, Serialize};

use crate::session::User;

/// Failure kinds carried on `/auth/auth-error?reason=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorReason {
    CodeExchangeFailed,
    VerificationFailed,
    MissingToken,
    ServerError,
}

impl AuthErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorReason::CodeExchangeFailed => "code_exchange_failed",
            AuthErrorReason::VerificationFailed => "verification_failed",
            AuthErrorReason::MissingToken => "missing_token",
            AuthErrorReason::ServerError => "server_error",
        }
    }

    /// Unknown or missing reasons render as `server_error`.
    pub fn parse_lossy(value: Option<&str>) -> Self {
        match value {
            Some("code_exchange_failed") => AuthErrorReason::CodeExchangeFailed,
            Some("verification_failed") => AuthErrorReason::VerificationFailed,
            Some("missing_token") => AuthErrorReason::MissingToken,
            _ => AuthErrorReason::ServerError,
        }
    }

    /// Default text shown when the redirect carried no provider message.
    pub fn description(self) -> &'static str {
        match self {
            AuthErrorReason::CodeExchangeFailed => "The sign-in link could not be exchanged for a session.",
            AuthErrorReason::VerificationFailed => "The email link could not be verified.",
            AuthErrorReason::MissingToken => "The sign-in link is missing its token.",
            AuthErrorReason::ServerError => "Something went wrong while signing you in.",
        }
    }
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub dev_bypass: bool,
}

/// GET /api/user response.
#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: serde_json::Value,
}

impl From<User> for UserInfoResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            user_metadata: user.user_metadata,
        }
    }
}

/// GET /signin and GET /signup response.
#[derive(Debug, Serialize)]
pub struct SignInPage {
    pub page: &'static str,
    pub providers: Vec<String>,
    pub oauth_path: &'static str,
}

/// GET /dashboard response.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: Option<UserInfoResponse>,
    pub dev_bypass: bool,
}

/// GET /auth/auth-error response.
#[derive(Debug, Serialize)]
pub struct AuthErrorPage {
    pub reason: AuthErrorReason,
    pub message: String,
}
