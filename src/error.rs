//! Error taxonomy for key setup, token coding, storage and per-request session work.
//!
//! Configuration errors are fatal and belong to startup. Everything a client can
//! influence (`DecodeError`, `LoadError`) is recovered locally by degrading to a
//! fresh session, so these types stay granular for logs and tests only.

use std::time::Duration;

use thiserror::Error;

/// Invalid or incomplete key configuration. Never recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("either `secret` or `key` must be configured")]
    MissingKeySource,
    #[error("`secret` and `key` are mutually exclusive, configure only one of them")]
    ConflictingKeySources,
    #[error("`secret` must not be empty")]
    EmptySecret,
    #[error("invalid salt: {0}")]
    InvalidSalt(String),
    #[error("`key` must contain at least one key")]
    NoKeys,
    #[error("too many keys: {count} configured, at most {max} supported")]
    TooManyKeys { count: usize, max: usize },
    #[error("invalid key at index {index}: expected {expected} bytes, got {actual}")]
    InvalidKey {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

/// Why an inbound token could not be turned back into a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed token")]
    Malformed,
    #[error("token did not authenticate under any configured key")]
    Unauthenticated,
    #[error("token is {len} bytes, limit is {limit}")]
    Oversized { len: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("failed to serialize payload: {0}")]
    Serialization(String),
    #[error("encryption failed")]
    Encryption,
    #[error("encoded token is {len} bytes, limit is {limit}")]
    Oversized { len: usize, limit: usize },
}

/// Failure reported by a session store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to serialize session data: {0}")]
    Serialization(String),
}

/// Errors surfaced by per-request session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("store-backed session has no identifier")]
    MissingIdentifier,
    #[error("failed to serialize session value: {0}")]
    Serialization(String),
}

/// Granular reason an inbound cookie did not hydrate a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("session not found in store")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}
