//! Session token extraction from the Cookie header.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

/// Extract the session token carried under `cookie_name`.
///
/// Scans every Cookie header on the request; the first matching pair wins.
/// Empty values resolve to `None`.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if name.trim() == cookie_name && !value.is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}
