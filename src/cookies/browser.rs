//! Client-side cookie adapter over an ambient, process-shared jar.
//!
//! Plays the role of the browser's cookie store for native clients: it
//! absorbs `Set-Cookie` headers from server responses and renders the
//! `Cookie` header for the next request.

use axum::http::HeaderMap;
use axum::http::header;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CookieOptions, CookieStore, parse_cookie_header, validate};

#[derive(Clone)]
struct Entry {
    value: String,
    expires: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| Instant::now() >= at)
    }
}

/// Shared cookie jar. Clones refer to the same jar.
#[derive(Clone, Default)]
pub struct BrowserCookies {
    store: Arc<DashMap<String, Entry>>,
}

impl BrowserCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every `Set-Cookie` header of a response to the jar.
    pub fn absorb(&self, headers: &HeaderMap) {
        for line in headers.get_all(header::SET_COOKIE) {
            let Ok(line) = line.to_str() else {
                continue;
            };
            let mut attrs = line.split(';');
            let Some((name, value)) = attrs.next().and_then(|kv| kv.trim().split_once('=')) else {
                continue;
            };
            let max_age = attrs.find_map(|attr| {
                let (key, v) = attr.trim().split_once('=')?;
                key.eq_ignore_ascii_case("max-age")
                    .then(|| v.trim().parse::<u64>().ok())
                    .flatten()
            });
            self.put(name.trim(), value.trim(), max_age);
        }
    }

    /// `Cookie` header value for the live entries, if any.
    pub fn cookie_header(&self) -> Option<String> {
        self.store.retain(|_, entry| !entry.is_expired());
        let mut pairs: Vec<String> = self
            .store
            .iter()
            .map(|e| format!("{}={}", e.key(), e.value().value))
            .collect();
        pairs.sort();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Seed the jar from a `Cookie` header value.
    pub fn seed(&self, cookie_header: &str) {
        for (name, value) in parse_cookie_header(cookie_header) {
            self.put(&name, &value, None);
        }
    }

    fn put(&self, name: &str, value: &str, max_age: Option<u64>) {
        if max_age == Some(0) {
            self.store.remove(name);
            return;
        }
        let expires = max_age.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.store.insert(
            name.to_string(),
            Entry {
                value: value.to_string(),
                expires,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.store.len()
    }
}

impl CookieStore for BrowserCookies {
    async fn get(&self, name: &str) -> Option<String> {
        let entry = self.store.get(name)?;
        if entry.value().is_expired() {
            drop(entry); // Release the read lock before removing
            self.store.remove(name);
            return None;
        }
        Some(entry.value().value.clone())
    }

    async fn set(&self, name: &str, value: &str, options: &CookieOptions) {
        if let Err(e) = validate(name, value) {
            tracing::warn!(cookie = name, error = %e, "skipping cookie write");
            return;
        }
        self.put(name, value, options.max_age);
    }

    async fn remove(&self, name: &str, _options: &CookieOptions) {
        self.store.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_set_and_get() {
        let jar = BrowserCookies::new();
        jar.set("k", "v", &CookieOptions::default()).await;
        assert_eq!(jar.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_remove() {
        let jar = BrowserCookies::new();
        jar.set("k", "v", &CookieOptions::default()).await;
        jar.remove("k", &CookieOptions::default()).await;
        assert!(jar.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_max_age_deletes() {
        let jar = BrowserCookies::new();
        jar.set("k", "v", &CookieOptions::default()).await;
        jar.set("k", "", &CookieOptions::default().removal()).await;
        assert!(jar.get("k").await.is_none());
        assert_eq!(jar.len(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_jar() {
        let jar = BrowserCookies::new();
        let other = jar.clone();
        other.set("k", "v", &CookieOptions::default()).await;
        assert_eq!(jar.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_absorb_set_cookie_headers() {
        let jar = BrowserCookies::new();
        jar.seed("gone=1");

        let mut headers = HeaderMap::new();
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_static("sid=abc; Max-Age=60; Path=/; HttpOnly; SameSite=Lax"),
        );
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_static("gone=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"),
        );
        jar.absorb(&headers);

        assert_eq!(jar.get("sid").await.as_deref(), Some("abc"));
        assert!(jar.get("gone").await.is_none());
        assert_eq!(jar.cookie_header().as_deref(), Some("sid=abc"));
    }

    #[test]
    fn test_cookie_header_empty() {
        assert!(BrowserCookies::new().cookie_header().is_none());
    }
}
