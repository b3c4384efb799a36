//! Access Guard middleware.
//!
//! Rejects requests lacking a valid session with a structured 401 before
//! any downstream stage runs. On success the validated identity rides on
//! the request extensions for the propagator and handlers.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use crate::gateway::error::GatewayError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::session::cookie;

/// Identity resolved by the guard, scoped to a single request.
/// Never cached across requests.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// The opaque session token the request carried.
    pub token: String,

    /// The validated user identifier.
    pub user_id: String,

    /// The user's email, when the session has one.
    pub email: Option<String>,

    /// Session expiry at the time of the guard check.
    pub expires_at: DateTime<Utc>,
}

/// Gate: pass requests with a valid user-bound session, reject the rest.
pub async fn session_guard(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = cookie::session_token(request.headers(), &state.cookie_name) else {
        metrics::record_guard_rejection("no_cookie");
        return GatewayError::Unauthorized.into_response();
    };

    let data = match state.store.lookup(&token).await {
        Ok(Some(data)) => data,
        Ok(None) => {
            metrics::record_guard_rejection("unknown_session");
            return GatewayError::Unauthorized.into_response();
        }
        Err(e) => {
            // An unreachable store is indistinguishable from "no session"
            // for the caller; the operator sees the error in the log.
            tracing::error!(error = %e, "Session store lookup failed");
            metrics::record_guard_rejection("store_error");
            return GatewayError::Unauthorized.into_response();
        }
    };

    // A session with no bound user is treated identically to no session.
    let Some(user_id) = data.user_id else {
        metrics::record_guard_rejection("anonymous_session");
        return GatewayError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(SessionIdentity {
        token,
        user_id,
        email: data.email,
        expires_at: data.expires_at,
    });

    next.run(request).await
}
