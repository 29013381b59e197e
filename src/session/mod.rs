//! Session Management Module
//!
//! Encrypted cookie sessions, either stateless (the cookie carries the data) or
//! store-backed (the cookie carries an opaque identifier).
//!
//! # Modules
//!
//! - [`codec`] - Token encryption and the cookie-safe wire format
//! - [`config`] - Operator options and the validated, shared configuration
//! - [`cookie`] - Cookie attributes and cookie construction
//! - [`state`] - The per-request [`Session`] and its lifecycle flags
//! - [`manager`] - Loading and finalizing sessions around a request
//! - [`store`] - The async storage contract for store-backed mode
//! - [`memory_store`] - In-memory store for development and tests

pub mod codec;
pub mod config;
pub mod cookie;
pub mod manager;
pub mod memory_store;
pub mod state;
pub mod store;

/// Session payload: a JSON object
pub type SessionData = serde_json::Map<String, serde_json::Value>;

// Re-export commonly used items for convenience
pub use codec::{Decoded, TokenCodec};
pub use config::{SessionConfig, SessionOptions};
pub use cookie::{CookieOptions, SameSitePolicy, DEFAULT_COOKIE_NAME};
pub use manager::{Finalization, SessionManager};
pub use memory_store::MemoryStore;
pub use state::{PendingAction, Session};
pub use store::{SessionStore, StoreRecord};
