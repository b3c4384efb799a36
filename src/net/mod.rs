//! Network layer subsystem.
//!
//! # Design Decisions
//! - Plain TCP accepting is delegated to axum::serve
//! - TLS is optional and pre-validated at startup (fail fast)

pub mod tls;
