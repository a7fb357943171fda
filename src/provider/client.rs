//! GoTrue HTTP client: token grants, OTP verification, user lookup,
//! logout and the OAuth authorize URL.

use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::session::{Session, User, now_secs};

/// Email OTP verification kinds accepted by `POST /verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Signup,
    Invite,
    Magiclink,
    Recovery,
    EmailChange,
    Email,
}

impl OtpType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "signup" => Some(OtpType::Signup),
            "invite" => Some(OtpType::Invite),
            "magiclink" => Some(OtpType::Magiclink),
            "recovery" => Some(OtpType::Recovery),
            "email_change" => Some(OtpType::EmailChange),
            "email" => Some(OtpType::Email),
            _ => None,
        }
    }
}

/// `verifyOtp({ type, token_hash })`
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtp {
    #[serde(rename = "type")]
    pub otp_type: OtpType,
    pub token_hash: String,
}

/// `signInWithOAuth({ provider, redirectTo, scopes })`
#[derive(Debug, Clone)]
pub struct OAuthSignIn {
    pub provider: String,
    pub redirect_to: String,
    pub scopes: Option<String>,
}

/// Thin client over the GoTrue REST API. Cheap to clone.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
}

impl ProviderClient {
    pub fn new(
        http: reqwest::Client,
        auth_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// `POST /token?grant_type=refresh_token`
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        self.token_grant("refresh_token", &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// `POST /token?grant_type=pkce`
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, ProviderError> {
        self.token_grant(
            "pkce",
            &json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
        )
        .await
    }

    /// `POST /verify`
    pub async fn verify_otp(&self, params: &VerifyOtp) -> Result<Session, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/verify", self.auth_url))
            .header("apikey", &self.anon_key)
            .json(params)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let session: Session = parse_json(resp).await?;
        Ok(session.with_absolute_expiry(now_secs()))
    }

    /// `GET /user`
    pub async fn get_user(&self, access_token: &str) -> Result<User, ProviderError> {
        let resp = self
            .http
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        parse_json(resp).await
    }

    /// `POST /logout?scope=global`
    pub async fn logout(&self, access_token: &str) -> Result<(), ProviderError> {
        let resp = self
            .http
            .post(format!("{}/logout", self.auth_url))
            .query(&[("scope", "global")])
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if resp.status().is_success() {
            return Ok(());
        }
        Err(rejection(resp).await)
    }

    /// Provider authorize URL the browser is sent to for an OAuth sign-in.
    pub fn authorize_url(
        &self,
        params: &OAuthSignIn,
        code_challenge: &str,
    ) -> Result<String, ProviderError> {
        let mut url = Url::parse(&format!("{}/authorize", self.auth_url))
            .map_err(|e| ProviderError::InvalidResponse(format!("bad auth url: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", &params.provider);
            query.append_pair("redirect_to", &params.redirect_to);
            if let Some(scopes) = params.scopes.as_deref().filter(|s| !s.is_empty()) {
                query.append_pair("scopes", scopes);
            }
            query.append_pair("code_challenge", code_challenge);
            query.append_pair("code_challenge_method", "s256");
        }
        Ok(url.to_string())
    }

    async fn token_grant(&self, grant_type: &str, body: &Value) -> Result<Session, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let session: Session = parse_json(resp).await?;
        Ok(session.with_absolute_expiry(now_secs()))
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T, ProviderError> {
    if !resp.status().is_success() {
        return Err(rejection(resp).await);
    }
    resp.json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// Turn a non-2xx response into `Rejected`, pulling the provider's message
/// out of whichever field this GoTrue version uses.
async fn rejection(resp: Response) -> ProviderError {
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let message = ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("identity provider request failed")
        .to_string();
    ProviderError::Rejected { status, message }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Message suitable for showing on the auth error page.
    pub fn user_message(&self) -> &str {
        match self {
            ProviderError::Rejected { message, .. } => message,
            ProviderError::RequestFailed(_) => "identity provider unreachable",
            ProviderError::InvalidResponse(_) => "unexpected identity provider response",
        }
    }
}
