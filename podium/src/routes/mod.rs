pub mod community;
pub mod moderation;
pub mod sync;

use axum::http::HeaderMap;

/// Shared-key auth for the trigger and moderation endpoints. Accepts the
/// dedicated header or a bearer token; an empty configured key rejects all.
pub fn authorized(headers: &HeaderMap, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    if let Some(value) = headers.get("X-PODIUM-KEY").and_then(|v| v.to_str().ok()) {
        if value == key {
            return true;
        }
    }
    if let Some(value) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(bearer) = value.strip_prefix("Bearer ") {
            return bearer == key;
        }
    }
    false
}
