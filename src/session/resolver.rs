//! Server-side session resolution.
//!
//! Reads the session through an [`AuthClient`], then validates the access
//! token: locally against the project JWT secret when one is configured,
//! otherwise by asking the provider for the user. Any failure, including
//! a timeout, resolves to "no session".

use std::time::Duration;

use crate::auth::{AuthClient, AuthError};
use crate::config::Config;
use crate::cookies::CookieStore;
use crate::provider::jwt::{self, JwtError};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct SessionResolver {
    timeout: Duration,
    jwt_secret: Option<String>,
}

impl SessionResolver {
    pub fn new(timeout: Duration, jwt_secret: Option<String>) -> Self {
        Self {
            timeout,
            jwt_secret,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_timeout, config.supabase_jwt_secret.clone())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validated session for the client's cookies, or `None`.
    ///
    /// Never fails; errors are logged at warn level.
    pub async fn resolve<C: CookieStore>(&self, client: &AuthClient<C>) -> Option<Session> {
        match tokio::time::timeout(self.timeout, self.try_resolve(client)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "session resolution failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "session resolution timed out");
                None
            }
        }
    }

    async fn try_resolve<C: CookieStore>(
        &self,
        client: &AuthClient<C>,
    ) -> Result<Option<Session>, AuthError> {
        let Some(mut session) = client.get_session().await? else {
            return Ok(None);
        };

        match &self.jwt_secret {
            Some(secret) => {
                let claims = jwt::verify_access_token(&session.access_token, secret)?;
                if claims.sub != session.user.id {
                    return Err(JwtError::SubjectMismatch {
                        token: claims.sub,
                        session: session.user.id,
                    }
                    .into());
                }
            }
            None => {
                // The cookie alone is not proof of identity; the provider's
                // view of the user replaces the cached one.
                session.user = client.provider().get_user(&session.access_token).await?;
            }
        }

        tracing::debug!(user_id = %session.subject(), "session resolved");
        Ok(Some(session))
    }
}
