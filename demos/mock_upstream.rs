//! Runnable stand-in for the second application.
//!
//! Serves an HTML page with root-relative asset paths, echoes the identity
//! headers the gateway injects, and answers WebSocket echoes — enough to
//! exercise every gateway path by hand.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::HeaderMap,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    let app = Router::new()
        .route("/", get(index))
        .route("/whoami", get(whoami))
        .route("/echo", get(ws_upgrade));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Second application is listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
  <head>
    <link rel="stylesheet" href="/style.css">
    <script src="/bundle.js"></script>
    <script src="//cdn.example.com/lib.js"></script>
  </head>
  <body>
    <a href="/dashboard">dashboard</a>
    <form action="/submit" method="post"><button>go</button></form>
  </body>
</html>
"#,
    )
}

async fn whoami(headers: HeaderMap) -> Json<serde_json::Value> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    Json(json!({
        "userId": get("x-session-user-id"),
        "userEmail": get("x-session-user-email"),
        "timestamp": get("x-session-timestamp"),
    }))
}

async fn ws_upgrade(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(echo)
}

async fn echo(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if socket.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    }
}
