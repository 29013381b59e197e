#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

//! Encrypted cookie sessions for actix-web.
//!
//! Session data is sealed with AES-256-GCM into a cookie-safe token. In
//! stateless mode the token carries the data; with a [`SessionStore`] attached
//! it carries only an opaque identifier. Keys can be rotated by prepending a
//! new one: tokens sealed under older keys still decode and are re-issued under
//! the active key.

/// Version of the sealed-session crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod keys;
pub mod middleware;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use error::{ConfigurationError, DecodeError, EncodeError, LoadError, SessionError, StoreError};
pub use keys::{derive_from_secret, sanitize_keys, KeyMaterial, KeyRing, SecretKey};
pub use middleware::{RequestSession, SessionMiddleware};
pub use session::{
    CookieOptions, Finalization, MemoryStore, Session, SessionConfig, SessionData,
    SessionManager, SessionOptions, SessionStore, TokenCodec,
};
pub use settings::Settings;
