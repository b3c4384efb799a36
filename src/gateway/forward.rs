//! Forwarding Engine.
//!
//! # Responsibilities
//! - Strip the mount prefix from the path before dispatch
//! - Copy method, headers, and body verbatim to the configured upstream
//! - Tunnel upgrade-capable transports end-to-end (WebSocket etc.)
//! - Surface any transport failure as a single 502; no retry
//!
//! # Design Decisions
//! - Hop-by-hop headers are stripped; Host is rewritten to the upstream
//!   authority so virtual-hosted upstreams resolve correctly
//! - accept-encoding is removed upstream-bound so HTML arrives uncompressed
//!   for the rewriter; encoded bytes are never pattern-substituted
//! - Response-head timeout is treated identically to a connection failure

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{ACCEPT_ENCODING, CONNECTION, HOST, UPGRADE};
use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderMap, HeaderValue, Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use thiserror::Error;
use tokio::io::{copy_bidirectional, AsyncWriteExt};
use url::Url;

use crate::gateway::error::GatewayError;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Error type for upstream base-URL parsing.
#[derive(Debug, Error)]
pub enum UpstreamUrlError {
    #[error("invalid upstream URL '{0}': {1}")]
    Parse(String, url::ParseError),

    #[error("upstream URL '{0}' must use http or https")]
    Scheme(String),

    #[error("upstream URL '{0}' has no host")]
    MissingHost(String),

    #[error("upstream URL '{0}' has an invalid authority")]
    Authority(String),
}

/// Parsed upstream base URL, built once per (re)load and shared read-only.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// The URL exactly as configured, echoed by the health endpoint.
    pub base_url: String,

    /// URI scheme for forwarded requests.
    pub scheme: Scheme,

    /// Authority (host\[:port\]) for forwarded requests.
    pub authority: Authority,

    /// Value written into the upstream-bound Host header.
    pub host_header: HeaderValue,
}

impl UpstreamTarget {
    /// Parse and validate a configured upstream base URL.
    pub fn parse(raw: &str) -> Result<Self, UpstreamUrlError> {
        let url = Url::parse(raw).map_err(|e| UpstreamUrlError::Parse(raw.to_string(), e))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(UpstreamUrlError::Scheme(raw.to_string()));
        }
        let scheme = Scheme::try_from(url.scheme())
            .map_err(|_| UpstreamUrlError::Scheme(raw.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| UpstreamUrlError::MissingHost(raw.to_string()))?;
        let authority_str = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority_str)
            .map_err(|_| UpstreamUrlError::Authority(raw.to_string()))?;
        let host_header = HeaderValue::from_str(&authority_str)
            .map_err(|_| UpstreamUrlError::Authority(raw.to_string()))?;

        Ok(Self {
            base_url: raw.to_string(),
            scheme,
            authority,
            host_header,
        })
    }
}

/// Build the shared upstream client with a bounded connect phase.
pub fn build_client(connect_timeout: Duration) -> Client<HttpConnector, Body> {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Remove the mount prefix from a request URI, preserving the query verbatim.
///
/// `/app/foo/bar?x=1` becomes `/foo/bar?x=1`; the bare mount becomes `/`.
/// Paths that merely share the prefix text (`/application`) are untouched.
pub fn strip_mount_prefix(uri: &Uri, mount_path: &str) -> String {
    let path = uri.path();
    let stripped = match path.strip_prefix(mount_path) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    };
    match uri.query() {
        Some(query) => format!("{stripped}?{query}"),
        None => stripped.to_string(),
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn wants_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);
    connection_upgrade && headers.contains_key(UPGRADE)
}

/// Forward one request to the upstream, returning its response.
///
/// A `101 Switching Protocols` reply upgrades both ends and tunnels them
/// in a spawned task; everything else flows through the normal path.
pub async fn forward(
    client: &Client<HttpConnector, Body>,
    target: &UpstreamTarget,
    request_timeout: Duration,
    mount_path: &str,
    request: Request<Body>,
) -> Result<Response<Incoming>, GatewayError> {
    let original_path = request.uri().path().to_string();
    let rewritten_path = strip_mount_prefix(request.uri(), mount_path);

    let (mut parts, body) = request.into_parts();

    // The caller's upgrade handle, if the transport supports one.
    let client_upgrade = parts.extensions.remove::<OnUpgrade>();
    let upgrade_requested = wants_upgrade(&parts.headers);
    let connection_header = parts.headers.get(CONNECTION).cloned();
    let upgrade_header = parts.headers.get(UPGRADE).cloned();

    let mut headers = HeaderMap::with_capacity(parts.headers.len());
    for (name, value) in parts.headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(HOST, target.host_header.clone());
    headers.remove(ACCEPT_ENCODING);
    if upgrade_requested {
        // Handshake headers pass through intact so the upstream can upgrade.
        if let (Some(connection), Some(upgrade)) = (connection_header, upgrade_header) {
            headers.insert(CONNECTION, connection);
            headers.insert(UPGRADE, upgrade);
        }
    }

    let uri = Uri::builder()
        .scheme(target.scheme.clone())
        .authority(target.authority.clone())
        .path_and_query(rewritten_path.clone())
        .build()?;

    tracing::info!(
        method = %parts.method,
        path = %original_path,
        target = %rewritten_path,
        "Forwarding request"
    );

    let mut upstream_request = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(body)?;
    *upstream_request.headers_mut() = headers;

    let mut response =
        match tokio::time::timeout(request_timeout, client.request(upstream_request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(path = %original_path, error = %e, "Upstream unreachable");
                return Err(GatewayError::UpstreamConnect(e));
            }
            Err(_) => {
                tracing::error!(
                    path = %original_path,
                    timeout = ?request_timeout,
                    "Upstream response timed out"
                );
                return Err(GatewayError::UpstreamTimeout(request_timeout));
            }
        };

    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
        match client_upgrade {
            Some(client_upgrade) => {
                let upstream_upgrade = hyper::upgrade::on(&mut response);
                tokio::spawn(tunnel(client_upgrade, upstream_upgrade));
            }
            None => {
                tracing::warn!(path = %original_path, "Upstream switched protocols but the caller cannot upgrade");
            }
        }
    }

    Ok(response)
}

/// Couple two upgraded connections until either side closes.
///
/// A caller disconnect tears the upstream side down with it rather than
/// letting the upstream run to completion.
async fn tunnel(client_upgrade: OnUpgrade, upstream_upgrade: OnUpgrade) {
    let (client_io, upstream_io) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "Connection upgrade failed");
            return;
        }
    };

    let mut client_io = TokioIo::new(client_io);
    let mut upstream_io = TokioIo::new(upstream_io);

    match copy_bidirectional(&mut client_io, &mut upstream_io).await {
        Ok((from_client, from_upstream)) => {
            tracing::debug!(from_client, from_upstream, "Tunnel closed");
        }
        Err(e) => {
            tracing::debug!(error = %e, "Tunnel ended with error");
        }
    }

    let _ = client_io.shutdown().await;
    let _ = upstream_io.shutdown().await;
}
