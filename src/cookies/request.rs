//! Server-side cookie adapter bound to one request/response pair.
//!
//! Seeded from the inbound `Cookie` header. Writes are visible to later
//! reads through the same adapter and queued as `Set-Cookie` lines that
//! [`RequestCookies::apply`] appends to the outbound response.

use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::response::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{CookieError, CookieOptions, CookieStore, parse_cookie_header, set_cookie_string, validate};
use crate::config::Environment;

#[derive(Default)]
struct Jar {
    values: HashMap<String, String>,
    pending: Vec<(String, HeaderValue)>,
}

impl Jar {
    fn queue(&mut self, name: &str, line: HeaderValue) {
        self.pending.retain(|(n, _)| n != name);
        self.pending.push((name.to_string(), line));
    }
}

/// Cookie state for a single request. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RequestCookies {
    jar: Arc<Mutex<Jar>>,
    environment: Environment,
}

impl RequestCookies {
    pub fn from_headers(headers: &HeaderMap, environment: Environment) -> Self {
        let mut values = HashMap::new();
        for raw in headers.get_all(header::COOKIE) {
            let Ok(raw) = raw.to_str() else {
                tracing::warn!("ignoring non-UTF-8 Cookie header");
                continue;
            };
            for (name, value) in parse_cookie_header(raw) {
                // First occurrence wins, matching browser precedence for the
                // most specific path.
                values.entry(name).or_insert(value);
            }
        }
        Self {
            jar: Arc::new(Mutex::new(Jar {
                values,
                pending: Vec::new(),
            })),
            environment,
        }
    }

    /// `Set-Cookie` lines queued so far, in write order.
    pub async fn pending(&self) -> Vec<HeaderValue> {
        let jar = self.jar.lock().await;
        jar.pending.iter().map(|(_, line)| line.clone()).collect()
    }

    /// Drain queued writes onto `response`.
    pub async fn apply(&self, response: &mut Response) {
        let pending = std::mem::take(&mut self.jar.lock().await.pending);
        for (_, line) in pending {
            response.headers_mut().append(header::SET_COOKIE, line);
        }
    }

    fn encode(
        &self,
        name: &str,
        value: &str,
        options: &CookieOptions,
    ) -> Result<HeaderValue, CookieError> {
        validate(name, value)?;
        let line = set_cookie_string(name, value, &options.hardened(self.environment));
        HeaderValue::from_str(&line).map_err(|_| CookieError::Header(name.into()))
    }
}

impl CookieStore for RequestCookies {
    async fn get(&self, name: &str) -> Option<String> {
        self.jar.lock().await.values.get(name).cloned()
    }

    async fn set(&self, name: &str, value: &str, options: &CookieOptions) {
        let line = match self.encode(name, value, options) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "skipping cookie write");
                return;
            }
        };
        let mut jar = self.jar.lock().await;
        jar.values.insert(name.to_string(), value.to_string());
        jar.queue(name, line);
    }

    async fn remove(&self, name: &str, options: &CookieOptions) {
        let line = match self.encode(name, "", &options.removal()) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "skipping cookie removal");
                return;
            }
        };
        let mut jar = self.jar.lock().await;
        jar.values.remove(name);
        jar.queue(name, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_reads_inbound_cookies() {
        let cookies = RequestCookies::from_headers(
            &headers_with_cookie("a=1; b=2"),
            Environment::Production,
        );
        assert_eq!(cookies.get("a").await.as_deref(), Some("1"));
        assert_eq!(cookies.get("b").await.as_deref(), Some("2"));
        assert!(cookies.get("c").await.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let cookies = RequestCookies::from_headers(&HeaderMap::new(), Environment::Production);
        cookies
            .set("sid", "abc.def", &CookieOptions::default())
            .await;
        assert_eq!(cookies.get("sid").await.as_deref(), Some("abc.def"));
    }

    #[tokio::test]
    async fn test_set_is_hardened_in_production() {
        let cookies = RequestCookies::from_headers(&HeaderMap::new(), Environment::Production);
        let loose = CookieOptions {
            http_only: false,
            ..CookieOptions::default()
        };
        cookies.set("sid", "v", &loose).await;
        let pending = cookies.pending().await;
        assert_eq!(pending.len(), 1);
        let line = pending[0].to_str().unwrap();
        assert!(line.contains("HttpOnly"));
        assert!(line.contains("Secure"));
        assert!(line.contains("SameSite=Lax"));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cookies = RequestCookies::from_headers(&HeaderMap::new(), Environment::Development);
        cookies.set("sid", "one", &CookieOptions::default()).await;
        cookies.set("sid", "two", &CookieOptions::default()).await;
        let pending = cookies.pending().await;
        assert_eq!(pending.len(), 1);
        assert!(pending[0].to_str().unwrap().starts_with("sid=two;"));
    }

    #[tokio::test]
    async fn test_remove_hides_value_and_queues_expiry() {
        let cookies = RequestCookies::from_headers(
            &headers_with_cookie("sid=old"),
            Environment::Development,
        );
        cookies.remove("sid", &CookieOptions::default()).await;
        assert!(cookies.get("sid").await.is_none());
        let pending = cookies.pending().await;
        assert!(pending[0].to_str().unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_invalid_value_is_skipped() {
        let cookies = RequestCookies::from_headers(&HeaderMap::new(), Environment::Development);
        cookies
            .set("sid", "not valid; value", &CookieOptions::default())
            .await;
        assert!(cookies.get("sid").await.is_none());
        assert!(cookies.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_appends_and_drains() {
        let cookies = RequestCookies::from_headers(&HeaderMap::new(), Environment::Development);
        cookies.set("a", "1", &CookieOptions::default()).await;
        cookies.set("b", "2", &CookieOptions::default()).await;

        let mut response = Response::new(Body::empty());
        cookies.apply(&mut response).await;
        let lines: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a=1"));
        assert!(lines[1].starts_with("b=2"));
        assert!(cookies.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cookies = RequestCookies::from_headers(&HeaderMap::new(), Environment::Development);
        let other = cookies.clone();
        other.set("k", "v", &CookieOptions::default()).await;
        assert_eq!(cookies.get("k").await.as_deref(), Some("v"));
    }
}
