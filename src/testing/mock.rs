//! Mock store implementations for testing
//!
//! Each mock isolates one failure mode of a real backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::{MemoryStore, SessionData, SessionStore, StoreRecord};

/// Store whose every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn get(&self, _id: &str) -> Result<Option<StoreRecord>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn set(&self, _id: &str, _data: &SessionData, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn destroy(&self, _id: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

/// Store that answers correctly, but only after `delay`
#[derive(Debug, Clone, Default)]
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }

    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl SessionStore for SlowStore {
    async fn get(&self, id: &str) -> Result<Option<StoreRecord>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(id, data, ttl).await
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.destroy(id).await
    }
}

/// A call observed by [`RecordingStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get(String),
    Set(String),
    Destroy(String),
}

/// In-memory store that records every call made to it
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl RecordingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls made so far, in order
    ///
    /// # Panics
    ///
    /// Panics if a previous test thread panicked while recording.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    #[must_use]
    pub fn saves(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StoreCall::Set(_)))
            .count()
    }

    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get(&self, id: &str) -> Result<Option<StoreRecord>, StoreError> {
        self.record(StoreCall::Get(id.to_string()));
        self.inner.get(id).await
    }

    async fn set(&self, id: &str, data: &SessionData, ttl: Duration) -> Result<(), StoreError> {
        self.record(StoreCall::Set(id.to_string()));
        self.inner.set(id, data, ttl).await
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Destroy(id.to_string()));
        self.inner.destroy(id).await
    }
}
