//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overlay)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the runtime state (upstream target, timeouts)
//!     → in-flight requests keep the state they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a reload
//! - All fields have defaults to allow minimal configs
//! - Mount path and listener changes require a restart; only the upstream
//!   target and proxy timeouts apply live

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GatewayConfig;
pub use schema::GatewaySettings;
pub use schema::ListenerConfig;
pub use schema::SessionConfig;
