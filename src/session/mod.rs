//! Session data model and resolution.
//!
//! A [`Session`] is owned by the identity provider; this crate only reads,
//! refreshes and deletes it through cookies.

pub mod resolver;

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub use resolver::SessionResolver;

/// Seconds before `expires_at` at which a session counts as expired.
pub const EXPIRY_MARGIN_SECS: u64 = 10;

/// Identity-provider user record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Session as issued by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".into()
}

impl Session {
    /// Subject identifier of the authenticated user.
    pub fn subject(&self) -> &str {
        &self.user.id
    }

    /// Fill in `expires_at` from `expires_in` when the provider omitted it.
    pub fn with_absolute_expiry(mut self, now: u64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now + secs);
        }
        self
    }

    /// Whether the access token must be refreshed at `now`.
    ///
    /// A session without any expiry information is treated as expired.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at
            .is_none_or(|at| at.saturating_sub(EXPIRY_MARGIN_SECS) <= now)
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
