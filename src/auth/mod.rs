//! Auth client factory.
//!
//! An [`AuthClient`] binds the identity provider to one cookie adapter.
//! The server variant works on a single request's [`RequestCookies`]; the
//! browser variant on an ambient [`BrowserCookies`] jar. Both persist the
//! session in the same sealed cookie format, so they see the same session
//! for the same underlying token.

pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use crate::audit::{self, Activity, Outcome, Protocol};
use crate::config::Config;
use crate::cookies::{BrowserCookies, CookieOptions, CookieStore, RequestCookies};
use crate::provider::jwt::{self, JwtError};
use crate::provider::{OAuthSignIn, ProviderClient, ProviderError, VerifyOtp, pkce};
use crate::session::{Session, User, now_secs};

/// Lifetime of the PKCE code-verifier cookie.
pub const CODE_VERIFIER_MAX_AGE_SECS: u64 = 600;

/// Process-wide, read-only client parameters.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub auth_url: String,
    pub anon_key: String,
    pub cookie_secret: String,
    pub storage_key: String,
    pub cookie_options: CookieOptions,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auth_url: config.auth_url(),
            anon_key: config.supabase_anon_key.clone(),
            cookie_secret: config.cookie_secret.clone(),
            storage_key: config.storage_key(),
            cookie_options: CookieOptions::session(config),
        }
    }

    fn code_verifier_key(&self) -> String {
        format!("{}-code-verifier", self.storage_key)
    }
}

/// Server-side client bound to one request/response pair.
pub fn create_server_client(
    settings: Arc<ClientSettings>,
    http: reqwest::Client,
    cookies: RequestCookies,
) -> AuthClient<RequestCookies> {
    AuthClient::new(settings, http, cookies)
}

/// Client-side client bound to the ambient cookie jar.
pub fn create_browser_client(
    settings: Arc<ClientSettings>,
    http: reqwest::Client,
    cookies: BrowserCookies,
) -> AuthClient<BrowserCookies> {
    AuthClient::new(settings, http, cookies)
}

/// Redirect target produced by [`AuthClient::sign_in_with_oauth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRedirect {
    pub provider: String,
    pub url: String,
}

pub struct AuthClient<C: CookieStore> {
    settings: Arc<ClientSettings>,
    provider: ProviderClient,
    cookies: C,
}

impl<C: CookieStore> AuthClient<C> {
    pub fn new(settings: Arc<ClientSettings>, http: reqwest::Client, cookies: C) -> Self {
        let provider = ProviderClient::new(http, &settings.auth_url, &settings.anon_key);
        Self {
            settings,
            provider,
            cookies,
        }
    }

    pub fn cookies(&self) -> &C {
        &self.cookies
    }

    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    /// Current session from cookies, refreshed through the provider when
    /// it has expired.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let key = &self.settings.storage_key;
        let Some(raw) = storage::load(&self.cookies, key).await else {
            return Ok(None);
        };

        let Some(session) = storage::open(self.settings.cookie_secret.as_bytes(), &raw) else {
            tracing::warn!("discarding unreadable session cookie");
            self.clear_session().await;
            return Ok(None);
        };
        let session = with_token_expiry(session);

        if !session.is_expired_at(now_secs()) {
            return Ok(Some(session));
        }

        tracing::debug!(user_id = %session.subject(), "session expired, refreshing");
        match self.provider.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => {
                self.save_session(&refreshed).await?;
                audit::authentication_event(
                    Activity::ServiceTicket,
                    Outcome::Success,
                    refreshed.user.email.as_deref(),
                    Protocol::Unknown,
                    "Session refresh succeeded",
                );
                Ok(Some(refreshed))
            }
            Err(e) => {
                audit::authentication_event(
                    Activity::ServiceTicket,
                    Outcome::Failure(audit::SEVERITY_MEDIUM),
                    session.user.email.as_deref(),
                    Protocol::Unknown,
                    &format!("Session refresh failed: {e}"),
                );
                // A refresh token the provider refuses will never work again.
                if matches!(e, ProviderError::Rejected { .. }) {
                    self.clear_session().await;
                }
                Err(e.into())
            }
        }
    }

    /// User record for the current session, fetched from the provider.
    pub async fn get_user(&self) -> Result<Option<User>, AuthError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };
        Ok(Some(self.provider.get_user(&session.access_token).await?))
    }

    /// End the session. Provider logout is best-effort; local cookies are
    /// always cleared.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = match self.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "could not load session for sign-out");
                None
            }
        };

        if let Some(session) = &session
            && let Err(e) = self.provider.logout(&session.access_token).await
        {
            tracing::warn!(error = %e, "provider logout failed, clearing local session anyway");
        }

        self.clear_session().await;

        audit::authentication_event(
            Activity::Logoff,
            Outcome::Success,
            session.as_ref().and_then(|s| s.user.email.as_deref()),
            Protocol::Unknown,
            "User signed out",
        );
        Ok(())
    }

    /// Exchange an OAuth authorization code (PKCE) for a session.
    pub async fn exchange_code_for_session(&self, code: &str) -> Result<Session, AuthError> {
        let verifier_key = self.settings.code_verifier_key();
        let verifier = self.cookies.get(&verifier_key).await.unwrap_or_default();
        if verifier.is_empty() {
            tracing::warn!("no PKCE code verifier cookie, exchanging without one");
        }

        let result = self.provider.exchange_code(code, &verifier).await;
        self.cookies
            .remove(&verifier_key, &self.settings.cookie_options)
            .await;

        let session = result?;
        self.save_session(&session).await?;
        Ok(session)
    }

    /// Verify an email OTP `token_hash` and start a session.
    pub async fn verify_otp(&self, params: &VerifyOtp) -> Result<Session, AuthError> {
        let session = self.provider.verify_otp(params).await?;
        self.save_session(&session).await?;
        let verifier_key = self.settings.code_verifier_key();
        if self.cookies.get(&verifier_key).await.is_some() {
            self.cookies
                .remove(&verifier_key, &self.settings.cookie_options)
                .await;
        }
        Ok(session)
    }

    /// Begin an OAuth sign-in: store a fresh PKCE verifier and return the
    /// provider URL to send the browser to.
    pub async fn sign_in_with_oauth(&self, params: &OAuthSignIn) -> Result<OAuthRedirect, AuthError> {
        let verifier = pkce::generate_code_verifier();
        let url = self
            .provider
            .authorize_url(params, &pkce::code_challenge(&verifier))?;

        let options = self
            .settings
            .cookie_options
            .with_max_age(CODE_VERIFIER_MAX_AGE_SECS);
        self.cookies
            .set(&self.settings.code_verifier_key(), &verifier, &options)
            .await;

        Ok(OAuthRedirect {
            provider: params.provider.clone(),
            url,
        })
    }

    /// Persist `session` through the cookie adapter.
    pub async fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        let sealed = storage::seal(self.settings.cookie_secret.as_bytes(), session)
            .map_err(|e| AuthError::Encode(e.to_string()))?;
        storage::store(
            &self.cookies,
            &self.settings.storage_key,
            &sealed,
            &self.settings.cookie_options,
        )
        .await;
        Ok(())
    }

    async fn clear_session(&self) {
        storage::clear(
            &self.cookies,
            &self.settings.storage_key,
            &self.settings.cookie_options,
        )
        .await;
    }
}

/// Fill a missing `expires_at` from the access token's `exp` claim.
fn with_token_expiry(mut session: Session) -> Session {
    if session.expires_at.is_none() {
        session.expires_at = jwt::decode_jwt_unverified(&session.access_token)
            .ok()
            .and_then(|claims| claims.exp);
    }
    session
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error("identity provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to encode session: {0}")]
    Encode(String),
}

impl AuthError {
    /// Message suitable for showing on the auth error page.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Provider(e) => e.user_message().to_string(),
            AuthError::Jwt(_) => "invalid access token".into(),
            AuthError::Timeout(_) => "identity provider timed out".into(),
            AuthError::Encode(_) => "could not store session".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OtpType;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> Arc<ClientSettings> {
        let mut config = Config::test_default();
        config.supabase_url = server.uri();
        Arc::new(ClientSettings::from_config(&config))
    }

    fn browser_client(server: &MockServer) -> AuthClient<BrowserCookies> {
        create_browser_client(settings_for(server), reqwest::Client::new(), BrowserCookies::new())
    }

    fn session(access: &str, refresh: &str, expires_at: u64) -> Session {
        Session {
            access_token: access.into(),
            refresh_token: refresh.into(),
            token_type: "bearer".into(),
            expires_in: Some(3600),
            expires_at: Some(expires_at),
            user: User {
                id: "user-1".into(),
                email: Some("a@example.com".into()),
                ..User::default()
            },
        }
    }

    fn token_body(access: &str, refresh: &str) -> serde_json::Value {
        json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": refresh,
            "user": {"id": "user-1", "email": "a@example.com"}
        })
    }

    #[tokio::test]
    async fn test_get_session_without_cookie() {
        let server = MockServer::start().await;
        let client = browser_client(&server);
        assert!(client.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saved_session_reads_back_without_network() {
        let server = MockServer::start().await;
        let client = browser_client(&server);
        let s = session("at", "rt", now_secs() + 3600);

        client.save_session(&s).await.unwrap();
        assert_eq!(client.get_session().await.unwrap(), Some(s));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({"refresh_token": "rt-old"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-new", "rt-new")))
            .expect(1)
            .mount(&server)
            .await;

        let client = browser_client(&server);
        client
            .save_session(&session("at-old", "rt-old", 1000))
            .await
            .unwrap();

        let refreshed = client.get_session().await.unwrap().unwrap();
        assert_eq!(refreshed.access_token, "at-new");

        // Second read comes from the rewritten cookie, no second refresh.
        let again = client.get_session().await.unwrap().unwrap();
        assert_eq!(again.access_token, "at-new");
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token"
            })))
            .mount(&server)
            .await;

        let client = browser_client(&server);
        client
            .save_session(&session("at-old", "rt-old", 1000))
            .await
            .unwrap();

        assert!(client.get_session().await.is_err());
        assert!(client.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_discarded() {
        let server = MockServer::start().await;
        let client = browser_client(&server);
        let key = client.settings.storage_key.clone();
        client
            .cookies()
            .set(&key, "garbage.value", &CookieOptions::default())
            .await;

        assert!(client.get_session().await.unwrap().is_none());
        assert!(client.cookies().get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code_uses_verifier_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "pkce"))
            .and(body_json(json!({"auth_code": "abc123", "code_verifier": "ver-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at", "rt")))
            .mount(&server)
            .await;

        let client = browser_client(&server);
        let verifier_key = client.settings.code_verifier_key();
        client
            .cookies()
            .set(&verifier_key, "ver-1", &CookieOptions::default())
            .await;

        let s = client.exchange_code_for_session("abc123").await.unwrap();
        assert_eq!(s.subject(), "user-1");
        assert!(client.cookies().get(&verifier_key).await.is_none());
        assert_eq!(client.get_session().await.unwrap().unwrap().access_token, "at");
    }

    #[tokio::test]
    async fn test_verify_otp_saves_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-otp", "rt")))
            .mount(&server)
            .await;

        let client = browser_client(&server);
        client
            .verify_otp(&VerifyOtp {
                otp_type: OtpType::Email,
                token_hash: "th".into(),
            })
            .await
            .unwrap();
        assert_eq!(
            client.get_session().await.unwrap().unwrap().access_token,
            "at-otp"
        );
    }

    #[tokio::test]
    async fn test_sign_in_with_oauth_stores_verifier() {
        let server = MockServer::start().await;
        let client = browser_client(&server);
        let redirect = client
            .sign_in_with_oauth(&OAuthSignIn {
                provider: "github".into(),
                redirect_to: "http://localhost:3000/auth/callback".into(),
                scopes: None,
            })
            .await
            .unwrap();

        assert_eq!(redirect.provider, "github");
        let verifier = client
            .cookies()
            .get(&client.settings.code_verifier_key())
            .await
            .unwrap();
        assert!(redirect.url.contains(&pkce::code_challenge(&verifier)));
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_if_provider_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = browser_client(&server);
        client
            .save_session(&session("at", "rt", now_secs() + 3600))
            .await
            .unwrap();

        client.sign_out().await.unwrap();
        assert!(client.get_session().await.unwrap().is_none());
    }

    #[test]
    fn test_expiry_taken_from_token_claim() {
        use jsonwebtoken::{EncodingKey, Header, encode};
        let token = encode(
            &Header::default(),
            &json!({"sub": "user-1", "exp": 4_000_000_000u64}),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        let mut s = session(&token, "rt", 0);
        s.expires_at = None;
        assert_eq!(with_token_expiry(s).expires_at, Some(4_000_000_000));

        let mut opaque = session("opaque", "rt", 0);
        opaque.expires_at = None;
        assert_eq!(with_token_expiry(opaque).expires_at, None);
    }

    #[tokio::test]
    async fn test_get_user_without_session() {
        let server = MockServer::start().await;
        assert!(browser_client(&server).get_user().await.unwrap().is_none());
    }
}
