//! In-memory session storage.
//!
//! Suitable for development, testing, and single-instance deployments.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::store::{SessionStore, StoreRecord};
use super::SessionData;
use crate::error::StoreError;

/// Default number of expired entries evicted per sweep.
pub const DEFAULT_SWEEP_BATCH: usize = 1024;

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<String, StoreRecord>,
    /// Every held record, ordered by expiry
    expiries: BTreeSet<(DateTime<Utc>, String)>,
}

impl Records {
    fn insert(&mut self, id: &str, record: StoreRecord) {
        let expires_at = record.expires_at;
        if let Some(previous) = self.by_id.insert(id.to_owned(), record) {
            self.expiries.remove(&(previous.expires_at, id.to_owned()));
        }
        self.expiries.insert((expires_at, id.to_owned()));
    }

    fn remove(&mut self, id: &str) {
        if let Some(record) = self.by_id.remove(id) {
            self.expiries.remove(&(record.expires_at, id.to_owned()));
        }
    }
}

/// In-memory session storage.
///
/// Stores records in a `HashMap` protected by a `RwLock`, alongside an
/// expiry-ordered index used by [`MemoryStore::sweep`]. Expired records are
/// treated as absent and evicted on access; [`MemoryStore::spawn_sweeper`]
/// additionally reclaims memory for entries that are never read again.
///
/// # Note
///
/// Records are lost when the process restarts and are not shared between
/// processes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Records>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.by_id.len()).unwrap_or(0)
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict at most `max_batch` expired records, returning how many were removed.
    ///
    /// Records are visited in expiry order, so a pass never looks at more than
    /// `max_batch` entries regardless of how many live records are held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn sweep(&self, max_batch: usize) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut records = self.records.write().map_err(|_| lock_poisoned())?;
        let mut removed = 0;
        while removed < max_batch {
            let Some((expires_at, id)) = records.expiries.first().cloned() else {
                break;
            };
            if expires_at > now {
                break;
            }
            records.remove(&id);
            removed += 1;
        }
        Ok(removed)
    }

    /// Run [`MemoryStore::sweep`] every `period` on the tokio runtime.
    ///
    /// The task runs until the returned handle is aborted.
    #[must_use]
    pub fn spawn_sweeper(&self, period: Duration, max_batch: usize) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match store.sweep(max_batch) {
                    Ok(0) => {}
                    Ok(removed) => log::debug!("Evicted {removed} expired sessions"),
                    Err(e) => log::warn!("Session sweep failed: {e}"),
                }
            }
        })
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::Backend("Lock poisoned".to_owned())
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<StoreRecord>, StoreError> {
        {
            let records = self.records.read().map_err(|_| lock_poisoned())?;
            match records.by_id.get(id) {
                None => return Ok(None),
                Some(record) if !record.is_expired() => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        // Expired: evict lazily, unless someone refreshed it in the meantime
        let mut records = self.records.write().map_err(|_| lock_poisoned())?;
        match records.by_id.get(id) {
            Some(record) if !record.is_expired() => Ok(Some(record.clone())),
            Some(_) => {
                records.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), StoreError> {
        let record = StoreRecord::new(data.clone(), ttl);
        self.records
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(id, record);
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| lock_poisoned())?
            .remove(id);
        Ok(())
    }
}
