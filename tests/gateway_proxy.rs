//! End-to-end pipeline properties of the session gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;

use session_gateway::session::{MemorySessionStore, SessionStore};

mod common;
use common::{
    gateway_config, session_cookie, start_gateway, start_mock_upstream, test_client,
    CountingStore,
};

#[tokio::test]
async fn rejects_requests_without_valid_session_and_never_forwards() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"hi".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store.clone()).await;
    let client = test_client();

    // No cookie at all.
    let res = client
        .get(format!("{}/app/secret", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "No valid session found. Please log in first.");

    // Unknown token.
    let res = client
        .get(format!("{}/app/secret", gateway.url()))
        .header("cookie", session_cookie("bogus-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Session exists but has no bound user.
    let anonymous = store.create_anonymous();
    let res = client
        .get(format!("{}/app/secret", gateway.url()))
        .header("cookie", session_cookie(&anonymous))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(upstream.hits(), 0, "upstream must never be reached");
    gateway.shutdown.trigger();
}

#[tokio::test]
async fn strips_mount_prefix_and_preserves_query() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;
    let client = test_client();

    for (request_path, forwarded) in [
        ("/app/foo/bar?x=1", "/foo/bar?x=1"),
        ("/app", "/"),
        ("/app/", "/"),
        ("/app/deep/a/b/c?q=two%20words&r=3", "/deep/a/b/c?q=two%20words&r=3"),
    ] {
        let res = client
            .get(format!("{}{}", gateway.url(), request_path))
            .header("cookie", session_cookie(&token))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "path {request_path}");
        let seen = upstream.requests().last().unwrap().uri.clone();
        assert_eq!(seen, forwarded, "path {request_path}");
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn injects_identity_headers_and_strips_spoofed_ones() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u123", Some("a@b.com")).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let res = test_client()
        .get(format!("{}/app/whoami", gateway.url()))
        .header("cookie", session_cookie(&token))
        .header("x-session-user-id", "attacker")
        .header("x-session-role", "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let seen = upstream.requests().pop().unwrap();
    assert_eq!(seen.headers.get("x-session-user-id").unwrap(), "u123");
    assert_eq!(seen.headers.get("x-session-user-email").unwrap(), "a@b.com");
    assert!(seen.headers.get("x-session-role").is_none());
    let ts = seen
        .headers
        .get("x-session-timestamp")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(ts.ends_with('Z'), "ISO-8601 UTC timestamp, got {ts}");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn touches_session_exactly_once_per_request() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(CountingStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store.clone()).await;
    let client = test_client();

    for _ in 0..5 {
        let res = client
            .get(format!("{}/app/ping", gateway.url()))
            .header("cookie", session_cookie(&token))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    assert_eq!(store.touch_count(), 5);

    // Rejected requests never touch.
    let res = client
        .get(format!("{}/app/ping", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.touch_count(), 5);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn rewrites_html_and_recomputes_content_length() {
    // The dashboard scenario: upstream serves HTML with a root-relative link.
    let upstream =
        start_mock_upstream(|_| (200, "text/html; charset=utf-8", b"<a href=\"/x\">go</a>".to_vec()))
            .await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u123", Some("a@b.com")).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let res = test_client()
        .get(format!("{}/app/dashboard", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let expected = r#"<a href="/app/x">go</a>"#;
    let content_length: usize = res
        .headers()
        .get("content-length")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(content_length, expected.len(), "length must match the rewritten body");

    let body = res.text().await.unwrap();
    assert_eq!(body, expected);

    let seen = upstream.requests().pop().unwrap();
    assert_eq!(seen.headers.get("x-session-user-id").unwrap(), "u123");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn rewrites_all_attribute_kinds_but_not_protocol_relative() {
    let page = br#"<link href="/style.css"><img src="/logo.png"><form action="/submit"></form><script src="//cdn.example.com/x.js"></script>"#;
    let upstream = start_mock_upstream(move |_| (200, "text/html", page.to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let body = test_client()
        .get(format!("{}/app/page", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains(r#"href="/app/style.css""#));
    assert!(body.contains(r#"src="/app/logo.png""#));
    assert!(body.contains(r#"action="/app/submit""#));
    assert!(body.contains(r#"src="//cdn.example.com/x.js""#), "protocol-relative URL was altered");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn non_html_bodies_pass_through_byte_for_byte() {
    // Includes bytes that are not valid UTF-8 and substrings that look
    // like rewritable attributes.
    let mut payload = vec![0xffu8, 0xfe, 0x00, 0x01, 0x80];
    payload.extend_from_slice(b"href=\"/x\" src=\"/y\"");
    payload.extend_from_slice(&[0xc3, 0x28, 0x00]);

    let expected = payload.clone();
    let upstream =
        start_mock_upstream(move |_| (200, "application/octet-stream", payload.clone())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let res = test_client()
        .get(format!("{}/app/blob", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.bytes().await.unwrap();
    assert_eq!(body.as_ref(), expected.as_slice());

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn unreachable_upstream_surfaces_documented_502() {
    // Grab a port that nothing listens on.
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway =
        start_gateway(gateway_config(Some(format!("http://{dead_addr}"))), store).await;
    let client = test_client();

    for method in [
        reqwest::Method::GET,
        reqwest::Method::POST,
        reqwest::Method::DELETE,
    ] {
        let res = client
            .request(method.clone(), format!("{}/app/x", gateway.url()))
            .header("cookie", session_cookie(&token))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY, "method {method}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Bad Gateway");
        assert_eq!(body["message"], "Unable to reach the second application");
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn concurrent_sessions_never_observe_each_other() {
    // The upstream echoes the user id header back in the body.
    let upstream = start_mock_upstream(|captured| {
        let user = captured
            .headers
            .get("x-session-user-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        (200, "text/plain", user.into_bytes())
    })
    .await;

    let store = Arc::new(MemorySessionStore::new(60));
    let token_a = store.create("user-a", None).await.unwrap();
    let token_b = store.create("user-b", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;
    let client = test_client();

    let mut tasks = Vec::new();
    for i in 0..40 {
        let (token, expected) = if i % 2 == 0 {
            (token_a.clone(), "user-a")
        } else {
            (token_b.clone(), "user-b")
        };
        let client = client.clone();
        let url = format!("{}/app/id", gateway.url());
        tasks.push(tokio::spawn(async move {
            let body = client
                .get(&url)
                .header("cookie", session_cookie(&token))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap();
            assert_eq!(body, expected);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn health_endpoint_reports_upstream_without_auth() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let res = test_client()
        .get(format!("{}/gateway/health", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["gateway"], "active");
    assert_eq!(body["secondAppUrl"], upstream.url());
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn session_info_returns_identity_or_401() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u42", Some("x@y.z")).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;
    let client = test_client();

    let res = client
        .get(format!("{}/gateway/session-info", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["userId"], "u42");
    assert_eq!(body["userEmail"], "x@y.z");
    assert_eq!(body["sessionId"], token);
    assert!(body["expiresAt"].as_str().unwrap().ends_with('Z'));

    let res = client
        .get(format!("{}/gateway/session-info", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn logout_destroys_the_session() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store.clone()).await;
    let client = test_client();

    let res = client
        .get(format!("{}/gateway/logout", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "logged out");

    // The session is gone: proxied requests are rejected now.
    let res = client
        .get(format!("{}/app/x", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Logging out without a cookie still succeeds.
    let res = client
        .get(format!("{}/gateway/logout", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn unmatched_routes_return_structured_404() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let res = test_client()
        .get(format!("{}/nowhere", gateway.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Not Found");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn all_routes_disabled_without_upstream_url() {
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(None), store).await;
    let client = test_client();

    // No partial registration: proxy and diagnostics are both gone.
    for path in ["/app/x", "/gateway/health", "/gateway/session-info"] {
        let res = client
            .get(format!("{}{}", gateway.url(), path))
            .header("cookie", session_cookie(&token))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "path {path}");
    }

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn hot_reload_swaps_the_upstream_target() {
    let first = start_mock_upstream(|_| (200, "text/plain", b"first".to_vec())).await;
    let second = start_mock_upstream(|_| (200, "text/plain", b"second".to_vec())).await;

    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(first.url())), store).await;
    let client = test_client();

    gateway
        .config_tx
        .send(gateway_config(Some(second.url())))
        .unwrap();

    // Reload is applied asynchronously; poll health until it lands.
    let mut swapped = false;
    for _ in 0..50 {
        let body: Value = client
            .get(format!("{}/gateway/health", gateway.url()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["secondAppUrl"] == second.url() {
            swapped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(swapped, "health never reflected the reloaded upstream");

    let body = client
        .get(format!("{}/app/x", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "second");
    assert!(second.hits() > 0);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn responses_carry_via_and_request_id_headers() {
    let upstream = start_mock_upstream(|_| (200, "text/plain", b"ok".to_vec())).await;
    let store = Arc::new(MemorySessionStore::new(60));
    let token = store.create("u1", None).await.unwrap();
    let gateway = start_gateway(gateway_config(Some(upstream.url())), store).await;

    let res = test_client()
        .get(format!("{}/app/x", gateway.url()))
        .header("cookie", session_cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers().get("via").unwrap(), "1.1 session-gateway");
    assert!(res.headers().contains_key("x-request-id"));

    // The request ID also travels to the upstream.
    let seen = upstream.requests().pop().unwrap();
    assert!(seen.headers.contains_key("x-request-id"));

    gateway.shutdown.trigger();
}
