//! Authenticated Reverse-Proxy Session Gateway
//!
//! Forwards authenticated traffic under a mount path to a second,
//! independently deployed application, carrying identity claims in
//! request headers and rewriting HTML asset paths on the way back.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────┐
//!                        │                SESSION GATEWAY                 │
//!                        │                                                │
//!   Client Request       │  ┌─────────┐   ┌──────────┐   ┌────────────┐   │
//!   ─────────────────────┼─▶│  http   │──▶│  guard   │──▶│  identity  │   │
//!                        │  │ server  │   │ (401?)   │   │ propagator │   │
//!                        │  └─────────┘   └────┬─────┘   └─────┬──────┘   │
//!                        │                     │               │          │
//!                        │              ┌──────▼──────┐  ┌─────▼──────┐   │
//!                        │              │   session   │  │  forward   │───┼──▶ Second
//!                        │              │   oracle    │  │  engine    │   │    Application
//!                        │              └─────────────┘  └─────┬──────┘   │
//!   Client Response      │  ┌──────────────┐                   │          │
//!   ◀────────────────────┼──│   response   │◀──────────────────┘          │
//!                        │  │   rewriter   │                              │
//!                        │  └──────────────┘                              │
//!                        │                                                │
//!                        │  ┌──────────────────────────────────────────┐  │
//!                        │  │          Cross-Cutting Concerns          │  │
//!                        │  │  config · observability · lifecycle · net│  │
//!                        │  └──────────────────────────────────────────┘  │
//!                        └────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod session;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use session::{MemorySessionStore, SessionStore};
