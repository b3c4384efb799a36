//! Gateway error taxonomy.
//!
//! Every failure is caught at the pipeline boundary and translated into one
//! of these variants, each of which renders a structured JSON response. No
//! failure exits the process or leaves a connection half-open.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::session::SessionStoreError;

/// Terminal failures of the proxy pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No valid session at the guard. Nothing was forwarded.
    #[error("no valid session")]
    Unauthorized,

    /// The upstream could not be reached or reset the connection.
    #[error("upstream request failed: {0}")]
    UpstreamConnect(#[source] hyper_util::client::legacy::Error),

    /// The upstream did not produce a response head within the budget.
    /// Treated identically to a connection failure.
    #[error("upstream request timed out after {0:?}")]
    UpstreamTimeout(Duration),

    /// The forwarded request could not be constructed.
    #[error("invalid upstream request: {0}")]
    InvalidUpstreamRequest(#[from] axum::http::Error),

    /// The session store failed an explicit operation (logout).
    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),
}

impl GatewayError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::UpstreamConnect(_) => "connect",
            GatewayError::UpstreamTimeout(_) => "timeout",
            GatewayError::InvalidUpstreamRequest(_) => "bad_request",
            GatewayError::SessionStore(_) => "session_store",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            GatewayError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "Unauthorized",
                    "message": "No valid session found. Please log in first.",
                }),
            ),
            GatewayError::UpstreamConnect(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::InvalidUpstreamRequest(_) => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Bad Gateway",
                    "message": "Unable to reach the second application",
                }),
            ),
            GatewayError::SessionStore(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Could not log out" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
