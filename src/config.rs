//! Application configuration via environment variables.
//!
//! Loaded once at startup and shared read-only through `AppState`.

use std::env;
use std::time::Duration;

/// Deployment environment. Drives cookie `Secure`, log format and the
/// development bypass of the route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid {
                key: "APP_ENV".into(),
                value: other.into(),
            }),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: Option<String>,
    pub cookie_secret: String,
    pub site_url: String,
    pub environment: Environment,
    pub dev_bypass: bool,
    pub port: u16,
    pub cookie_domain: Option<String>,
    pub session_timeout: Duration,
    pub session_max_age_secs: u64,
    pub oauth_providers: Vec<String>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Required: `SUPABASE_URL`, `SUPABASE_ANON_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(key.into()))
        };

        let environment = match lookup("APP_ENV") {
            Some(v) => Environment::parse(&v)?,
            None => Environment::Production,
        };

        // The bypass can only ever be on outside production.
        let dev_bypass = !environment.is_production()
            && lookup("AUTH_DEV_BYPASS")
                .map(|v| flag(&v))
                .unwrap_or(true);

        let session_timeout_ms = lookup("SESSION_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3000);

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            supabase_jwt_secret: lookup("SUPABASE_JWT_SECRET").filter(|v| !v.is_empty()),
            cookie_secret: lookup("COOKIE_SECRET")
                .unwrap_or_else(|| "change-me-in-production".into()),
            site_url: lookup("SITE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            environment,
            dev_bypass,
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cookie_domain: lookup("COOKIE_DOMAIN").filter(|v| !v.is_empty()),
            session_timeout: Duration::from_millis(session_timeout_ms),
            session_max_age_secs: lookup("SESSION_MAX_AGE_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(7 * 24 * 3600),
            oauth_providers: lookup("OAUTH_PROVIDERS")
                .map(|v| {
                    v.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["github".into(), "google".into()]),
        })
    }

    /// GoTrue API root, e.g. `https://abcd.supabase.co/auth/v1`.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    /// Project reference: first DNS label of the Supabase host.
    pub fn project_ref(&self) -> &str {
        let host = self
            .supabase_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.supabase_url);
        let host = host.split(['/', ':']).next().unwrap_or(host);
        host.split('.').next().unwrap_or(host)
    }

    /// Cookie name holding the sealed session.
    pub fn storage_key(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    /// Where the identity provider sends the browser back after OAuth.
    pub fn callback_url(&self) -> String {
        format!("{}/auth/callback", self.site_url)
    }
}

/// Configuration for tests, all fields settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            supabase_url: "https://testref.supabase.co".into(),
            supabase_anon_key: "test-anon-key".into(),
            supabase_jwt_secret: None,
            cookie_secret: "test-cookie-secret".into(),
            site_url: "http://localhost:3000".into(),
            environment: Environment::Production,
            dev_bypass: false,
            port: 3000,
            cookie_domain: None,
            session_timeout: Duration::from_secs(3),
            session_max_age_secs: 7 * 24 * 3600,
            oauth_providers: vec!["github".into(), "google".into()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
}

fn flag(value: &str) -> bool {
    matches!(value, "true" | "1" | "True" | "yes")
}
