//! Route guard: per-request redirect/passthrough decision.

pub mod middleware;

use crate::auth::AuthClient;
use crate::config::Config;
use crate::cookies::CookieStore;
use crate::session::{Session, SessionResolver};

pub use middleware::{CurrentSession, ServerClient, route_guard};

pub const SIGN_IN_PATH: &str = "/signin";
pub const SIGN_UP_PATH: &str = "/signup";
/// Protected landing page.
pub const LANDING_PATH: &str = "/dashboard";
pub const AUTH_ERROR_PATH: &str = "/auth/auth-error";

const PROTECTED_PREFIX: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Public,
}

/// Classify a request path.
pub fn classify(path: &str) -> RouteClass {
    if let Some(rest) = path.strip_prefix(PROTECTED_PREFIX)
        && (rest.is_empty() || rest.starts_with('/'))
    {
        return RouteClass::Protected;
    }
    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    if trimmed == SIGN_IN_PATH || trimmed == SIGN_UP_PATH {
        return RouteClass::AuthOnly;
    }
    RouteClass::Public
}

/// Development bypass for protected routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevBypass {
    Enabled,
    Disabled,
}

impl DevBypass {
    pub fn from_config(config: &Config) -> Self {
        if config.dev_bypass {
            DevBypass::Enabled
        } else {
            DevBypass::Disabled
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Passthrough,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    bypass: DevBypass,
    resolver: SessionResolver,
}

impl RouteGuard {
    pub fn new(bypass: DevBypass, resolver: SessionResolver) -> Self {
        Self { bypass, resolver }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DevBypass::from_config(config),
            SessionResolver::from_config(config),
        )
    }

    pub fn bypass(&self) -> DevBypass {
        self.bypass
    }

    pub fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    /// Decision table for a classified path and session presence.
    pub fn decide(&self, class: RouteClass, session_present: bool) -> GuardDecision {
        match (class, session_present) {
            (RouteClass::Protected, true) => GuardDecision::Passthrough,
            (RouteClass::Protected, false) => match self.bypass {
                DevBypass::Enabled => GuardDecision::Passthrough,
                DevBypass::Disabled => GuardDecision::Redirect(SIGN_IN_PATH.into()),
            },
            (RouteClass::AuthOnly, true) => GuardDecision::Redirect(LANDING_PATH.into()),
            (RouteClass::AuthOnly, false) => GuardDecision::Passthrough,
            (RouteClass::Public, _) => GuardDecision::Passthrough,
        }
    }

    /// Resolve the session when the path needs it and decide.
    pub async fn check<C: CookieStore>(
        &self,
        path: &str,
        client: &AuthClient<C>,
    ) -> (GuardDecision, Option<Session>) {
        let class = classify(path);
        if class == RouteClass::Public {
            return (GuardDecision::Passthrough, None);
        }

        let session = self.resolver.resolve(client).await;
        let decision = self.decide(class, session.is_some());

        if class == RouteClass::Protected
            && session.is_none()
            && decision == GuardDecision::Passthrough
        {
            tracing::warn!(path, "development bypass: serving protected route without a session");
        }
        (decision, session)
    }
}
