//! Session persistence in cookies.
//!
//! Cookie format: `base64url(json(session)).base64url(hmac_sha256(secret, payload))`
//!
//! Values longer than [`MAX_CHUNK_SIZE`] are split across `<key>.0`,
//! `<key>.1`, ... cookies since browsers cap a single cookie near 4 KiB.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::cookies::{CookieOptions, CookieStore};
use crate::session::Session;

type HmacSha256 = Hmac<Sha256>;

pub const MAX_CHUNK_SIZE: usize = 3180;

/// Upper bound on chunks read or removed for one key.
const MAX_CHUNKS: usize = 32;

/// Seal a session into a tamper-evident cookie value.
pub fn seal(secret: &[u8], session: &Session) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(session)?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let signature = sign(secret, &payload);
    Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify and decode a sealed cookie value.
///
/// Returns `None` if the signature is invalid or the format is wrong.
pub fn open(secret: &[u8], value: &str) -> Option<Session> {
    let (payload, sig_part) = value.rsplit_once('.')?;
    let expected_sig = URL_SAFE_NO_PAD.decode(sig_part).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&expected_sig).ok()?;

    let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&json).ok()
}

fn sign(secret: &[u8], payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Split a cookie value into chunks no longer than `size`.
///
/// Sealed values are ASCII, so byte offsets are char boundaries.
pub fn split_chunks(value: &str, size: usize) -> Vec<&str> {
    if value.len() <= size {
        return vec![value];
    }
    value
        .as_bytes()
        .chunks(size)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect()
}

fn chunk_name(key: &str, index: usize) -> String {
    format!("{key}.{index}")
}

/// Read a possibly chunked cookie value.
pub async fn load<C: CookieStore>(cookies: &C, key: &str) -> Option<String> {
    if let Some(value) = cookies.get(key).await {
        return Some(value);
    }
    let mut combined = String::new();
    for index in 0..MAX_CHUNKS {
        let Some(chunk) = cookies.get(&chunk_name(key, index)).await else {
            break;
        };
        combined.push_str(&chunk);
    }
    (!combined.is_empty()).then_some(combined)
}

/// Write a value, chunking if needed, and drop stale chunks of any
/// previous write.
pub async fn store<C: CookieStore>(cookies: &C, key: &str, value: &str, options: &CookieOptions) {
    let chunks = split_chunks(value, MAX_CHUNK_SIZE);

    if chunks.len() == 1 {
        cookies.set(key, value, options).await;
        remove_chunks_from(cookies, key, 0, options).await;
        return;
    }

    for (index, chunk) in chunks.iter().enumerate() {
        cookies.set(&chunk_name(key, index), chunk, options).await;
    }
    remove_chunks_from(cookies, key, chunks.len(), options).await;
    if cookies.get(key).await.is_some() {
        cookies.remove(key, options).await;
    }
}

/// Remove the value and every chunk of it.
pub async fn clear<C: CookieStore>(cookies: &C, key: &str, options: &CookieOptions) {
    if cookies.get(key).await.is_some() {
        cookies.remove(key, options).await;
    }
    remove_chunks_from(cookies, key, 0, options).await;
}

async fn remove_chunks_from<C: CookieStore>(
    cookies: &C,
    key: &str,
    start: usize,
    options: &CookieOptions,
) {
    for index in start..MAX_CHUNKS {
        let name = chunk_name(key, index);
        if cookies.get(&name).await.is_none() {
            break;
        }
        cookies.remove(&name, options).await;
    }
}
