//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack, request ID)
//!     → gateway pipeline (guard → propagate → forward → rewrite)
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
