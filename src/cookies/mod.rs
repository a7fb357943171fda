//! Cookie adapter: one asynchronous `get`/`set`/`remove` surface over
//! either the per-request cookie state (server) or an ambient jar (client).

pub mod browser;
pub mod request;

use std::future::Future;

use crate::config::{Config, Environment};

pub use browser::BrowserCookies;
pub use request::RequestCookies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

/// Attributes written alongside a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age: Option<u64>,
}

impl CookieOptions {
    /// Options for session cookies under the given configuration.
    pub fn session(config: &Config) -> Self {
        Self {
            path: "/".into(),
            domain: config.cookie_domain.clone(),
            http_only: true,
            secure: config.environment.is_production(),
            same_site: SameSite::Lax,
            max_age: Some(config.session_max_age_secs),
        }
    }

    /// Same attributes with a different lifetime.
    pub fn with_max_age(&self, max_age: u64) -> Self {
        Self {
            max_age: Some(max_age),
            ..self.clone()
        }
    }

    /// Options that expire the cookie immediately.
    pub fn removal(&self) -> Self {
        self.with_max_age(0)
    }

    /// Server-side floor: never script-readable, always `Lax`, `Secure`
    /// whenever the deployment is production.
    pub fn hardened(&self, environment: Environment) -> Self {
        Self {
            http_only: true,
            same_site: SameSite::Lax,
            secure: self.secure || environment.is_production(),
            ..self.clone()
        }
    }
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            http_only: true,
            secure: false,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }
}

/// Named cookie storage with async access.
///
/// Failures inside an implementation are logged and degrade to "cookie
/// absent"; they never surface to the caller.
pub trait CookieStore: Send + Sync {
    /// Current value of `name`, if any.
    fn get(&self, name: &str) -> impl Future<Output = Option<String>> + Send;

    /// Write `name=value` with the given attributes.
    fn set(
        &self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> impl Future<Output = ()> + Send;

    /// Expire `name`.
    fn remove(&self, name: &str, options: &CookieOptions) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("invalid cookie name: {0:?}")]
    InvalidName(String),

    #[error("invalid characters in value of cookie {0:?}")]
    InvalidValue(String),

    #[error("cookie {0:?} cannot be encoded as a header value")]
    Header(String),
}

/// Reject names and values that cannot travel in a `Cookie` header
/// unquoted (RFC 6265 token / cookie-octet).
pub(crate) fn validate(name: &str, value: &str) -> Result<(), CookieError> {
    let name_ok = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b));
    if !name_ok {
        return Err(CookieError::InvalidName(name.into()));
    }
    let value_ok = value
        .bytes()
        .all(|b| b.is_ascii_graphic() && !b"\",;\\".contains(&b));
    if !value_ok {
        return Err(CookieError::InvalidValue(name.into()));
    }
    Ok(())
}

/// Parse every `name=value` pair from a `Cookie` header value.
pub(crate) fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Render a `Set-Cookie` header line.
pub fn set_cookie_string(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut parts = vec![format!("{}={}", name, value)];
    if let Some(max_age) = options.max_age {
        parts.push(format!("Max-Age={}", max_age));
    }
    parts.push(format!("Path={}", options.path));
    if let Some(domain) = &options.domain {
        parts.push(format!("Domain={domain}"));
    }
    if options.http_only {
        parts.push("HttpOnly".into());
    }
    if options.secure {
        parts.push("Secure".into());
    }
    parts.push(format!("SameSite={}", options.same_site.as_str()));
    parts.join("; ")
}
