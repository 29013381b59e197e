//! Per-request session state.
//!
//! A [`Session`] is hydrated from the inbound cookie (or created fresh), mutated
//! by handlers, and finalized exactly once by the
//! [`SessionManager`](super::SessionManager). The four lifecycle flags decide
//! what finalization does:
//!
//! | flag      | set by                                                        |
//! |-----------|---------------------------------------------------------------|
//! | `created` | fresh construction, `regenerate` in store-backed mode        |
//! | `changed` | `insert`, `remove`, `clear`                                   |
//! | `rotated` | decode under a legacy key, `touch`, `set_cookie_options`      |
//! | `deleted` | `destroy`; dominates everything else                          |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::config::SessionConfig;
use super::cookie::CookieOptions;
use super::SessionData;
use crate::error::{LoadError, SessionError, StoreError};
use crate::utils::crypto::generate_session_id;

/// What finalization should do with a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Leave the client's cookie alone
    Skip,
    /// Tell the client to drop the cookie
    Clear,
    /// Issue a cookie, persisting to the store first when `save` is set
    Issue { save: bool },
}

#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<SessionConfig>,
    id: Option<String>,
    data: SessionData,
    cookie_overrides: Option<CookieOptions>,
    created: bool,
    changed: bool,
    rotated: bool,
    deleted: bool,
}

impl Session {
    /// A fresh, empty session. Store-backed sessions get a new identifier.
    #[must_use]
    pub fn new(config: Arc<SessionConfig>) -> Self {
        let id = config.is_store_backed().then(generate_session_id);
        Self {
            config,
            id,
            data: SessionData::new(),
            cookie_overrides: None,
            created: true,
            changed: false,
            rotated: false,
            deleted: false,
        }
    }

    fn hydrated(config: Arc<SessionConfig>, id: Option<String>, data: SessionData) -> Self {
        Self {
            config,
            id,
            data,
            cookie_overrides: None,
            created: false,
            changed: false,
            rotated: false,
            deleted: false,
        }
    }

    /// Hydrate a session from an inbound token, reporting why it failed
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The token does not decode (`LoadError::Decode`)
    /// - The store has no live record for the identifier (`LoadError::NotFound`)
    /// - The store call fails or times out (`LoadError::Store`)
    pub async fn try_from_cookie(
        config: Arc<SessionConfig>,
        token: &str,
    ) -> Result<Self, LoadError> {
        let Some(store) = config.store().cloned() else {
            let decoded = config.codec().decode::<SessionData>(token)?;
            let rotated = !decoded.matched_active_key();
            let mut session = Self::hydrated(config, None, decoded.payload);
            session.rotated = rotated;
            return Ok(session);
        };

        let decoded = config.codec().decode::<String>(token)?;
        let record = bounded(config.store_timeout(), store.get(&decoded.payload))
            .await?
            .ok_or(LoadError::NotFound)?;

        let rotated = !decoded.matched_active_key();
        let mut session = Self::hydrated(config, Some(decoded.payload), record.data);
        session.rotated = rotated;
        Ok(session)
    }

    /// Hydrate from an optional inbound token. Never fails: any problem
    /// degrades to a fresh session.
    pub async fn from_cookie(config: Arc<SessionConfig>, token: Option<&str>) -> Self {
        let Some(token) = token else {
            log::debug!("No session cookie, creating an empty session");
            return Self::new(config);
        };

        match Self::try_from_cookie(Arc::clone(&config), token).await {
            Ok(session) => {
                log::debug!("Session successfully decoded");
                session
            }
            Err(LoadError::Store(e)) => {
                log::warn!("Session store unavailable ({e}), creating an empty session");
                Self::new(config)
            }
            Err(e) => {
                log::debug!("Session cookie rejected ({e}), creating an empty session");
                Self::new(config)
            }
        }
    }

    /// Read a value, deserializing it into `T`. Missing or mistyped values
    /// read as `None`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Store a value under `key`. Ignored once the session is destroyed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Serialization` if `value` cannot be represented
    /// as JSON.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), SessionError> {
        if self.deleted {
            log::debug!("Ignoring insert on a destroyed session");
            return Ok(());
        }
        let value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.data.insert(key.into(), value);
        self.changed = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if self.deleted {
            log::debug!("Ignoring remove on a destroyed session");
            return None;
        }
        self.changed = true;
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        if self.deleted {
            return;
        }
        self.data.clear();
        self.changed = true;
    }

    /// Re-issue the cookie with fresh attributes without touching the data
    pub fn touch(&mut self) {
        if !self.deleted {
            self.rotated = true;
        }
    }

    /// Per-session cookie attributes, merged over the configured ones when the
    /// cookie is written. Later calls replace earlier overrides.
    pub fn set_cookie_options(&mut self, options: CookieOptions) {
        if self.deleted {
            return;
        }
        self.cookie_overrides = Some(options);
        self.rotated = true;
    }

    /// Effective cookie attributes for this session
    #[must_use]
    pub fn cookie_options(&self) -> CookieOptions {
        match &self.cookie_overrides {
            Some(overrides) => overrides.merged_over(self.config.cookie_options()),
            None => self.config.cookie_options().clone(),
        }
    }

    /// Mark the session deleted and drop its data. In store-backed mode the
    /// record is removed as well. Calling it again is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails or times out. The session is
    /// marked deleted regardless.
    pub async fn destroy(&mut self) -> Result<(), SessionError> {
        let first_call = !self.deleted;
        self.deleted = true;
        self.data.clear();

        if !first_call {
            return Ok(());
        }
        if let (Some(store), Some(id)) = (self.config.store(), self.id.as_deref()) {
            bounded(self.config.store_timeout(), store.destroy(id)).await?;
        }
        Ok(())
    }

    /// Persist the data to the store. No-op for stateless or destroyed sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store call fails or times out, or if a
    /// store-backed session has lost its identifier.
    pub async fn save(&self) -> Result<(), SessionError> {
        if self.deleted {
            return Ok(());
        }
        let Some(store) = self.config.store() else {
            return Ok(());
        };
        let id = self.id.as_deref().ok_or(SessionError::MissingIdentifier)?;
        bounded(
            self.config.store_timeout(),
            store.set(id, &self.data, self.config.ttl()),
        )
        .await?;
        Ok(())
    }

    /// Issue a new identity for the same data.
    ///
    /// Store-backed sessions drop the old record and get a fresh identifier,
    /// so a token planted before login is worthless afterwards. Stateless
    /// sessions are simply re-encrypted under a new nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if removing the old record fails or times out. The
    /// new identifier is assigned regardless.
    pub async fn regenerate(&mut self) -> Result<(), SessionError> {
        if self.deleted {
            return Ok(());
        }
        let Some(store) = self.config.store().cloned() else {
            self.rotated = true;
            return Ok(());
        };

        let old_id = self.id.replace(generate_session_id());
        self.created = true;
        if let Some(old_id) = old_id {
            bounded(self.config.store_timeout(), store.destroy(&old_id)).await?;
        }
        Ok(())
    }

    /// Encode the cookie value: the identifier in store-backed mode, the data
    /// itself otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or a store-backed session has no
    /// identifier.
    pub fn to_cookie(&self) -> Result<String, SessionError> {
        let codec = self.config.codec();
        let token = if self.config.is_store_backed() {
            let id = self.id.as_deref().ok_or(SessionError::MissingIdentifier)?;
            codec.encode(id)?
        } else {
            codec.encode(&self.data)?
        };
        Ok(token)
    }

    /// Decide what finalization has to do, without side effects
    #[must_use]
    pub fn pending_action(&self) -> PendingAction {
        if self.deleted {
            return PendingAction::Clear;
        }
        if self.created && !self.changed && !self.rotated && !self.config.save_uninitialized() {
            return PendingAction::Skip;
        }
        if !self.created && !self.changed && !self.rotated {
            return PendingAction::Skip;
        }
        PendingAction::Issue {
            save: self.created || self.changed,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[must_use]
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn created(&self) -> bool {
        self.created
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.changed
    }

    #[must_use]
    pub fn rotated(&self) -> bool {
        self.rotated
    }

    #[must_use]
    pub fn deleted(&self) -> bool {
        self.deleted
    }
}

/// Run a store call under the configured deadline
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::sanitize_keys;
    use crate::session::MemoryStore;
    use crate::session::SessionStore;
    use serde_json::json;

    const KEY: &str = "0123456789abcdef0123456789abcdef";
    const LEGACY_KEY: &str = "fedcba9876543210fedcba9876543210";

    fn stateless(keys: &[&str]) -> Arc<SessionConfig> {
        Arc::new(SessionConfig::new(sanitize_keys(keys).unwrap()))
    }

    fn store_backed(store: &MemoryStore) -> Arc<SessionConfig> {
        Arc::new(
            SessionConfig::new(sanitize_keys(&[KEY]).unwrap()).with_store(Arc::new(store.clone())),
        )
    }

    #[tokio::test]
    async fn test_fresh_session_flags() {
        let session = Session::from_cookie(stateless(&[KEY]), None).await;
        assert!(session.created());
        assert!(!session.changed());
        assert!(!session.rotated());
        assert!(!session.deleted());
        assert!(session.id().is_none());
        assert_eq!(session.pending_action(), PendingAction::Issue { save: true });
    }

    #[tokio::test]
    async fn test_hydrated_session_is_clean() {
        let config = stateless(&[KEY]);
        let mut session = Session::new(Arc::clone(&config));
        session.insert("uid", 42).unwrap();
        let token = session.to_cookie().unwrap();

        let hydrated = Session::from_cookie(config, Some(&token)).await;
        assert_eq!(hydrated.get::<i64>("uid"), Some(42));
        assert!(!hydrated.created());
        assert!(!hydrated.changed());
        assert!(!hydrated.rotated());
        assert_eq!(hydrated.pending_action(), PendingAction::Skip);
    }

    #[tokio::test]
    async fn test_legacy_key_marks_rotated() {
        let mut old = Session::new(stateless(&[LEGACY_KEY]));
        old.insert("uid", 7).unwrap();
        let token = old.to_cookie().unwrap();

        let session = Session::from_cookie(stateless(&[KEY, LEGACY_KEY]), Some(&token)).await;
        assert_eq!(session.get::<i64>("uid"), Some(7));
        assert!(session.rotated());
        assert_eq!(session.pending_action(), PendingAction::Issue { save: false });
    }

    #[tokio::test]
    async fn test_garbage_cookie_degrades_to_fresh() {
        let session = Session::from_cookie(stateless(&[KEY]), Some("garbage")).await;
        assert!(session.created());
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_get_does_not_mark_changed() {
        let session = Session::new(stateless(&[KEY]));
        assert_eq!(session.get::<String>("missing"), None);
        assert!(!session.changed());
    }

    #[tokio::test]
    async fn test_mistyped_value_reads_as_none() {
        let mut session = Session::new(stateless(&[KEY]));
        session.insert("uid", "not-a-number").unwrap();
        assert_eq!(session.get::<i64>("uid"), None);
        assert_eq!(session.get_value("uid"), Some(&json!("not-a-number")));
    }

    #[tokio::test]
    async fn test_mutations_mark_changed() {
        let config = stateless(&[KEY]);
        let mut session = Session::new(config);
        session.remove("nothing");
        assert!(session.changed());
    }

    #[tokio::test]
    async fn test_destroy_dominates_and_ignores_mutations() {
        let mut session = Session::new(stateless(&[KEY]));
        session.insert("uid", 1).unwrap();
        session.destroy().await.unwrap();
        session.destroy().await.unwrap();

        session.insert("uid", 2).unwrap();
        session.touch();
        assert!(session.deleted());
        assert!(session.is_empty());
        assert_eq!(session.pending_action(), PendingAction::Clear);
    }

    #[tokio::test]
    async fn test_save_uninitialized_false_skips_untouched_fresh_session() {
        let config = Arc::new(
            SessionConfig::new(sanitize_keys(&[KEY]).unwrap()).with_save_uninitialized(false),
        );
        let mut session = Session::new(config);
        assert_eq!(session.pending_action(), PendingAction::Skip);

        session.insert("uid", 1).unwrap();
        assert_eq!(session.pending_action(), PendingAction::Issue { save: true });
    }

    #[tokio::test]
    async fn test_cookie_overrides_merge_over_config() {
        let mut session = Session::new(stateless(&[KEY]));
        session.set_cookie_options(CookieOptions {
            max_age: Some(60),
            ..Default::default()
        });

        let options = session.cookie_options();
        assert_eq!(options.max_age, Some(60));
        assert_eq!(options.path.as_deref(), Some("/"));
        assert!(session.rotated());
    }

    #[tokio::test]
    async fn test_store_backed_roundtrip() {
        let store = MemoryStore::new();
        let config = store_backed(&store);

        let mut session = Session::new(Arc::clone(&config));
        let id = session.id().unwrap().to_string();
        session.insert("uid", 42).unwrap();
        session.save().await.unwrap();
        let token = session.to_cookie().unwrap();

        let hydrated = Session::try_from_cookie(config, &token).await.unwrap();
        assert_eq!(hydrated.id(), Some(id.as_str()));
        assert_eq!(hydrated.get::<i64>("uid"), Some(42));
    }

    #[tokio::test]
    async fn test_store_backed_legacy_key_marks_rotated() {
        let store = MemoryStore::new();
        let legacy = Arc::new(
            SessionConfig::new(sanitize_keys(&[LEGACY_KEY]).unwrap())
                .with_store(Arc::new(store.clone())),
        );
        let mut old = Session::new(legacy);
        let id = old.id().unwrap().to_string();
        old.insert("uid", 7).unwrap();
        old.save().await.unwrap();
        let token = old.to_cookie().unwrap();

        let current = Arc::new(
            SessionConfig::new(sanitize_keys(&[KEY, LEGACY_KEY]).unwrap())
                .with_store(Arc::new(store.clone())),
        );
        let session = Session::try_from_cookie(current, &token).await.unwrap();
        assert_eq!(session.id(), Some(id.as_str()));
        assert_eq!(session.get::<i64>("uid"), Some(7));
        assert!(session.rotated());
        assert!(!session.created());
        assert_eq!(session.pending_action(), PendingAction::Issue { save: false });
    }

    #[tokio::test]
    async fn test_store_backed_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let config = store_backed(&store);
        let session = Session::new(Arc::clone(&config));
        let token = session.to_cookie().unwrap();

        let err = Session::try_from_cookie(config, &token).await.unwrap_err();
        assert_eq!(err, LoadError::NotFound);
    }

    #[tokio::test]
    async fn test_store_backed_destroy_removes_record() {
        let store = MemoryStore::new();
        let mut session = Session::new(store_backed(&store));
        session.insert("uid", 1).unwrap();
        session.save().await.unwrap();
        assert_eq!(store.len(), 1);

        session.destroy().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_regenerate_store_backed_issues_new_id() {
        let store = MemoryStore::new();
        let config = store_backed(&store);
        let mut session = Session::new(config);
        session.insert("uid", 1).unwrap();
        session.save().await.unwrap();
        let old_id = session.id().unwrap().to_string();

        session.regenerate().await.unwrap();
        assert_ne!(session.id(), Some(old_id.as_str()));
        assert!(session.created());
        assert!(store.get(&old_id).await.unwrap().is_none());
        assert_eq!(session.get::<i64>("uid"), Some(1));
    }

    #[tokio::test]
    async fn test_regenerate_stateless_marks_rotated() {
        let mut session = Session::new(stateless(&[KEY]));
        session.regenerate().await.unwrap();
        assert!(session.rotated());
        assert!(session.id().is_none());
    }
}
