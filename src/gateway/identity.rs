//! Identity Propagator.
//!
//! # Responsibilities
//! - Strip client-supplied x-session-* headers (spoofing guard)
//! - Inject the validated identity into the upstream-bound header set
//! - Touch the session so every forwarded call is an implicit keep-alive
//!
//! # Design Decisions
//! - Identity headers are computed fresh per request, never cached
//! - The touch is bounded and best-effort: a slow or failing store must
//!   not abort forwarding

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{SecondsFormat, Utc};

use crate::gateway::guard::SessionIdentity;
use crate::observability::metrics;
use crate::session::SessionStore;

/// Header carrying the validated user id to the upstream.
pub const USER_ID_HEADER: &str = "x-session-user-id";
/// Header carrying the user email (empty string when absent).
pub const USER_EMAIL_HEADER: &str = "x-session-user-email";
/// Header carrying the ISO-8601 timestamp of the forwarding call.
pub const TIMESTAMP_HEADER: &str = "x-session-timestamp";

const IDENTITY_PREFIX: &str = "x-session-";

/// Replace any inbound x-session-* headers with the validated identity.
pub fn propagate_identity(headers: &mut HeaderMap, identity: &SessionIdentity) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(IDENTITY_PREFIX))
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(&name);
    }

    if let Ok(value) = HeaderValue::from_str(&identity.user_id) {
        headers.insert(USER_ID_HEADER, value);
    }

    let email = identity.email.as_deref().unwrap_or("");
    headers.insert(
        USER_EMAIL_HEADER,
        HeaderValue::from_str(email).unwrap_or_else(|_| HeaderValue::from_static("")),
    );

    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&timestamp) {
        headers.insert(TIMESTAMP_HEADER, value);
    }
}

/// Extend the session's expiry, bounded by `budget`.
///
/// Failures and timeouts are logged and recorded but never surfaced:
/// the request proceeds either way.
pub async fn touch_session(store: &Arc<dyn SessionStore>, token: &str, budget: Duration) {
    match tokio::time::timeout(budget, store.touch(token)).await {
        Ok(Ok(())) => {
            metrics::record_session_touch("ok");
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Session touch failed; forwarding anyway");
            metrics::record_session_touch("error");
        }
        Err(_) => {
            tracing::warn!(budget = ?budget, "Session touch timed out; forwarding anyway");
            metrics::record_session_touch("timeout");
        }
    }
}
