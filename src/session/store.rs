//! Server-side session storage contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::session::SessionData;

/// A stored session payload with its expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub data: SessionData,
    pub expires_at: DateTime<Utc>,
}

impl StoreRecord {
    /// Record expiring `ttl` from now. Saturates far in the future instead of
    /// overflowing on absurd TTLs.
    #[must_use]
    pub fn new(data: SessionData, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { data, expires_at }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Storage backend for store-backed sessions
///
/// Implementations must be safe to call concurrently from many in-flight
/// requests. Last writer wins on `set`; no cross-request transactions are
/// expected.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch a live record
    ///
    /// Unknown, expired and destroyed ids all return `Ok(None)`; callers must
    /// not be able to tell them apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn get(&self, id: &str) -> Result<Option<StoreRecord>, StoreError>;

    /// Insert or replace a record, resetting its expiry to `now + ttl`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the data cannot be stored.
    async fn set(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a record. Removing an absent id is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn destroy(&self, id: &str) -> Result<(), StoreError>;
}
