//! Session Oracle subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → cookie.rs (extract session token from Cookie header)
//!     → store.rs (SessionStore trait: lookup / touch / destroy)
//!     → memory.rs (DashMap-backed store with TTL + background sweeper)
//! ```
//!
//! # Design Decisions
//! - The gateway never owns session durability; it talks to the store
//!   through the SessionStore trait only
//! - A session without a bound user id is treated identically to no session
//! - Concurrent touches interleave safely; last write wins on expiry

pub mod cookie;
pub mod memory;
pub mod store;

pub use memory::MemorySessionStore;
pub use store::{SessionData, SessionStore, SessionStoreError};
