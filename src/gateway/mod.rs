//! Authenticated reverse-proxy core.
//!
//! # Data Flow
//! ```text
//! Inbound request under the mount path
//!     → guard.rs (session lookup; 401 short-circuit, nothing is forwarded)
//!     → identity.rs (inject x-session-* headers, best-effort touch)
//!     → forward.rs (strip mount prefix, dispatch to upstream, tunnel upgrades)
//!     → rewrite.rs (buffer + rewrite HTML asset paths; stream everything else)
//!     → Response to the original caller
//! ```
//!
//! # Design Decisions
//! - Pipeline stages are strictly sequential per request; requests never
//!   share state except through the session store
//! - Upstream failures surface as a single 502; there is no retry
//! - HTML bodies are fully accumulated before any byte is released, so a
//!   partial write can never leak an un-rewritten fragment

pub mod endpoints;
pub mod error;
pub mod forward;
pub mod guard;
pub mod identity;
pub mod rewrite;

pub use error::GatewayError;
pub use forward::UpstreamTarget;
pub use guard::SessionIdentity;
