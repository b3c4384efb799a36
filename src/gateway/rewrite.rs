//! Response Rewriter.
//!
//! # Responsibilities
//! - Buffer HTML bodies in full, then prefix root-relative asset paths
//!   (`href`/`src`/`action`) with the mount path
//! - Recompute Content-Length for the rewritten body
//! - Stream every other content type through byte-for-byte
//!
//! # Design Decisions
//! - Accumulation is an explicit stage ahead of the transform; no byte is
//!   released until the whole body has been rewritten
//! - Fail safe: undecodable or oversized HTML passes through unmodified
//!   rather than dropping the response
//! - Protocol-relative URLs (`//cdn...`) are never altered
//! - Encoded bodies (Content-Encoding present) are treated as opaque bytes

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderValue, Response};
use futures_util::{stream, StreamExt};
use hyper::body::Incoming;

use crate::observability::metrics;

/// The attribute kinds whose root-relative values gain the mount prefix.
const REWRITTEN_ATTRIBUTES: [&str; 3] = ["href", "src", "action"];

/// Prefix root-relative `href`/`src`/`action` values with the mount path.
///
/// Matches attribute text anywhere in the document, the same substring
/// semantics the asset references rely on. Values starting with `//` are
/// protocol-relative and left untouched.
pub fn rewrite_html(html: &str, mount_path: &str) -> String {
    let mut out = html.to_string();
    for attr in REWRITTEN_ATTRIBUTES {
        out = rewrite_attribute(&out, attr, mount_path);
    }
    out
}

fn rewrite_attribute(html: &str, attr: &str, mount_path: &str) -> String {
    let needle = format!("{attr}=\"/");
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    let mut rest = html;

    while let Some(idx) = rest.find(&needle) {
        let end = idx + needle.len();
        out.push_str(&rest[..end]);
        // A second slash means protocol-relative; leave it alone.
        if !rest[end..].starts_with('/') {
            out.truncate(out.len() - 1);
            out.push_str(mount_path);
            out.push('/');
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn is_html(response: &Response<Incoming>) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}

/// Turn an upstream response into the final caller-facing response,
/// rewriting HTML asset paths and passing everything else through.
pub async fn apply_rewrite(
    response: Response<Incoming>,
    mount_path: &str,
    max_buffer_bytes: usize,
) -> Response<Body> {
    // Encoded bytes must never be pattern-substituted.
    if !is_html(&response) || response.headers().contains_key(CONTENT_ENCODING) {
        let (parts, body) = response.into_parts();
        return Response::from_parts(parts, Body::new(body));
    }

    let (mut parts, body) = response.into_parts();
    let mut data_stream = Body::new(body).into_data_stream();

    let mut buffered: Vec<u8> = Vec::with_capacity(8 * 1024);
    while let Some(chunk) = data_stream.next().await {
        match chunk {
            Ok(data) => {
                buffered.extend_from_slice(&data);
                if buffered.len() > max_buffer_bytes {
                    tracing::warn!(
                        buffered = buffered.len(),
                        limit = max_buffer_bytes,
                        "HTML body exceeds rewrite buffer; passing through unrewritten"
                    );
                    let prefix = stream::iter([Ok(Bytes::from(buffered))]);
                    let body = Body::from_stream(prefix.chain(data_stream));
                    return Response::from_parts(parts, body);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream body failed mid-stream during HTML accumulation");
                let prefix = stream::iter([Ok(Bytes::from(buffered))]);
                let tail = stream::iter([Err(e)]);
                let body = Body::from_stream(prefix.chain(tail));
                return Response::from_parts(parts, body);
            }
        }
    }

    let html = match String::from_utf8(buffered) {
        Ok(html) => html,
        Err(e) => {
            // Declared HTML but not decodable: availability over cosmetics.
            tracing::warn!("HTML body is not valid UTF-8; passing through unmodified");
            let bytes = e.into_bytes();
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    let rewritten = rewrite_html(&html, mount_path);
    metrics::record_html_rewrite(rewritten.len());

    // The body length changed; a stale Content-Length must not survive.
    parts.headers.remove(TRANSFER_ENCODING);
    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from(rewritten.len()));

    Response::from_parts(parts, Body::from(rewritten))
}
