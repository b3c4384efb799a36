//! Health & introspection endpoints.
//!
//! Thin diagnostic surface next to the proxy: gateway status, the caller's
//! session identity, and explicit logout.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::gateway::guard::SessionIdentity;
use crate::http::server::AppState;
use crate::session::cookie;

/// `GET /gateway/health` — static status plus the current upstream target.
/// No auth, no side effects. Reflects hot-reloaded configuration.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let runtime = state.runtime.load();
    Json(json!({
        "status": "ok",
        "gateway": "active",
        "secondAppUrl": runtime.target.base_url,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// `GET /gateway/session-info` — the caller's validated identity and expiry.
/// Guarded; does not touch the session.
pub async fn session_info(Extension(identity): Extension<SessionIdentity>) -> Json<serde_json::Value> {
    Json(json!({
        "authenticated": true,
        "userId": identity.user_id,
        "userEmail": identity.email,
        "sessionId": identity.token,
        "expiresAt": identity.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// `GET /gateway/logout` — destroy the caller's session.
///
/// Succeeds when no session cookie is present; destroying nothing is fine.
/// A store failure is the one surface where the oracle error is fatal.
pub async fn logout(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Response {
    if let Some(token) = cookie::session_token(request.headers(), &state.cookie_name) {
        if let Err(e) = state.store.destroy(&token).await {
            tracing::error!(error = %e, "Session destroy failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not log out" })),
            )
                .into_response();
        }
        tracing::info!("Session destroyed via logout");
    }

    Json(json!({ "status": "logged out" })).into_response()
}

/// Catch-all for paths the gateway does not serve.
pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("No route for {}", uri.path()),
        })),
    )
        .into_response()
}
