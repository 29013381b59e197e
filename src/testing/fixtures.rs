//! Test fixtures providing pre-built test objects

use std::sync::Arc;
use std::time::Duration;

use crate::keys::{sanitize_keys, KeyRing};
use crate::session::{SessionConfig, SessionManager, SessionStore};

use super::constants::{LEGACY_KEY, TEST_KEY};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Ring holding only [`TEST_KEY`]
    ///
    /// # Panics
    ///
    /// Never, the constant is a valid key.
    #[must_use]
    pub fn key_ring() -> KeyRing {
        sanitize_keys(&[TEST_KEY]).expect("test key is valid")
    }

    /// Ring holding [`TEST_KEY`] as active and [`LEGACY_KEY`] as legacy
    ///
    /// # Panics
    ///
    /// Never, the constants are valid keys.
    #[must_use]
    pub fn rotated_key_ring() -> KeyRing {
        sanitize_keys(&[TEST_KEY, LEGACY_KEY]).expect("test keys are valid")
    }

    /// Ring holding only [`LEGACY_KEY`], as a deployment before rotation
    ///
    /// # Panics
    ///
    /// Never, the constant is a valid key.
    #[must_use]
    pub fn legacy_key_ring() -> KeyRing {
        sanitize_keys(&[LEGACY_KEY]).expect("legacy key is valid")
    }

    /// Stateless configuration with default cookie attributes
    #[must_use]
    pub fn stateless_config() -> SessionConfig {
        SessionConfig::new(Self::key_ring())
    }

    #[must_use]
    pub fn store_backed_config(store: Arc<dyn SessionStore>) -> SessionConfig {
        SessionConfig::new(Self::key_ring())
            .with_store(store)
            .with_store_timeout(Duration::from_millis(200))
    }

    #[must_use]
    pub fn stateless_manager() -> SessionManager {
        SessionManager::new(Self::stateless_config())
    }

    #[must_use]
    pub fn store_backed_manager(store: Arc<dyn SessionStore>) -> SessionManager {
        SessionManager::new(Self::store_backed_config(store))
    }
}
