//! Session Manager
//!
//! The single entry point a web framework needs: turn an inbound cookie value
//! into a [`Session`] at the start of a request, and turn the session back into
//! a response cookie (or nothing) at the end of it.
//!
//! Neither half ever fails the request. A bad cookie becomes a fresh session,
//! and a store that cannot save is logged while the cookie is still written.

use std::sync::Arc;

use actix_web::cookie::Cookie;

use super::config::SessionConfig;
use super::state::{PendingAction, Session};

/// Outcome of finalizing a session
#[derive(Debug, Clone, PartialEq)]
pub enum Finalization {
    /// Leave the response untouched
    Skip,
    /// Append a cookie that removes the session on the client
    Clear(Cookie<'static>),
    /// Append the (re)issued session cookie
    Set(Cookie<'static>),
}

impl Finalization {
    /// The cookie to append, if any
    #[must_use]
    pub fn into_cookie(self) -> Option<Cookie<'static>> {
        match self {
            Self::Skip => None,
            Self::Clear(cookie) | Self::Set(cookie) => Some(cookie),
        }
    }
}

/// Loads and finalizes sessions for one configuration
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: Arc<SessionConfig>,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn from_shared(config: Arc<SessionConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Arc<SessionConfig> {
        &self.config
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        self.config.cookie_name()
    }

    /// A fresh, empty session
    #[must_use]
    pub fn create_session(&self) -> Session {
        Session::new(Arc::clone(&self.config))
    }

    /// Session for the inbound cookie value. Never fails.
    pub async fn load_session(&self, token: Option<&str>) -> Session {
        Session::from_cookie(Arc::clone(&self.config), token).await
    }

    /// Decide the response cookie for a finished request, saving to the store
    /// first when the session was created or changed.
    pub async fn finalize(&self, session: Option<Session>) -> Finalization {
        let Some(session) = session else {
            log::debug!("No session on request, leaving cookies as they are");
            return Finalization::Skip;
        };

        let name = self.config.cookie_name();
        match session.pending_action() {
            PendingAction::Skip => {
                log::debug!("Session was not changed, leaving it as is");
                Finalization::Skip
            }
            PendingAction::Clear => {
                log::debug!("Deleting session");
                Finalization::Clear(session.cookie_options().build_removal_cookie(name))
            }
            PendingAction::Issue { save } => {
                if save {
                    log::debug!("Saving session");
                    if let Err(e) = session.save().await {
                        log::error!("Failed to save session: {e}");
                    }
                }
                match session.to_cookie() {
                    Ok(token) => Finalization::Set(session.cookie_options().build_cookie(name, token)),
                    Err(e) => {
                        log::error!("Failed to encode session cookie: {e}");
                        Finalization::Skip
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::sanitize_keys;
    use crate::session::{MemoryStore, SessionStore};
    use actix_web::cookie::time::Duration;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig::new(sanitize_keys(&[KEY]).unwrap()))
    }

    #[tokio::test]
    async fn test_no_session_is_skipped() {
        assert_eq!(manager().finalize(None).await, Finalization::Skip);
    }

    #[tokio::test]
    async fn test_fresh_session_sets_cookie() {
        let manager = manager();
        let session = manager.load_session(None).await;

        let Finalization::Set(cookie) = manager.finalize(Some(session)).await else {
            panic!("expected a cookie");
        };
        assert_eq!(cookie.name(), "Session");
        assert!(!cookie.value().is_empty());
    }

    #[tokio::test]
    async fn test_untouched_hydrated_session_is_skipped() {
        let manager = manager();
        let mut session = manager.create_session();
        session.insert("uid", 42).unwrap();
        let token = session.to_cookie().unwrap();

        let hydrated = manager.load_session(Some(&token)).await;
        assert_eq!(manager.finalize(Some(hydrated)).await, Finalization::Skip);
    }

    #[tokio::test]
    async fn test_destroyed_session_clears_cookie() {
        let manager = manager();
        let mut session = manager.create_session();
        session.destroy().await.unwrap();

        let Finalization::Clear(cookie) = manager.finalize(Some(session)).await else {
            panic!("expected a clearing cookie");
        };
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_store_backed_finalize_saves() {
        let store = MemoryStore::new();
        let manager = SessionManager::new(
            SessionConfig::new(sanitize_keys(&[KEY]).unwrap()).with_store(Arc::new(store.clone())),
        );
        let mut session = manager.load_session(None).await;
        session.insert("uid", 42).unwrap();
        let id = session.id().unwrap().to_string();

        let cookie = manager.finalize(Some(session)).await.into_cookie().unwrap();
        assert!(!cookie.value().contains("42"));
        assert!(store.get(&id).await.unwrap().is_some());
    }
}
