//! Immutable session configuration.
//!
//! [`SessionOptions`] is what operators write (TOML, env, code). It is validated
//! once into a [`SessionConfig`], which every request then shares through an
//! `Arc`. Nothing here is process-global.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::codec::{TokenCodec, DEFAULT_MAX_TOKEN_BYTES};
use super::cookie::{CookieOptions, DEFAULT_COOKIE_NAME};
use super::store::SessionStore;
use crate::error::ConfigurationError;
use crate::keys::{decode_salt, derive_from_secret, sanitize_keys, KeyMaterial, KeyRing};

/// Default lifetime of store records (24 hours)
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

/// Default upper bound for a single store call
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Operator-facing session options
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Human passphrase; a key is derived from it
    pub secret: Option<String>,
    /// Base64 salt for `secret` (16 bytes once decoded)
    pub salt: Option<String>,
    /// One raw 32-byte key or an ordered list, active key first
    pub key: Option<KeyMaterial>,
    pub cookie_name: String,
    /// Attributes left unset fall back to [`CookieOptions::recommended`]
    pub cookie: CookieOptions,
    pub ttl_seconds: u64,
    pub max_token_bytes: usize,
    pub store_timeout_ms: u64,
    /// Emit a cookie for sessions that were created but never touched
    pub save_uninitialized: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            secret: None,
            salt: None,
            key: None,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie: CookieOptions::recommended(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            max_token_bytes: DEFAULT_MAX_TOKEN_BYTES,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            save_uninitialized: true,
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("salt", &self.salt)
            .field("key", &self.key)
            .field("cookie_name", &self.cookie_name)
            .field("cookie", &self.cookie)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_token_bytes", &self.max_token_bytes)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("save_uninitialized", &self.save_uninitialized)
            .finish()
    }
}

impl SessionOptions {
    /// Resolve the configured key source into a key ring
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Neither or both of `secret` and `key` are set
    /// - The secret is empty or the salt is invalid
    /// - Any raw key has the wrong length
    pub fn key_ring(&self) -> Result<KeyRing, ConfigurationError> {
        match (self.secret.as_deref(), self.key.as_ref()) {
            (Some(_), Some(_)) => Err(ConfigurationError::ConflictingKeySources),
            (None, None) => Err(ConfigurationError::MissingKeySource),
            (Some(secret), None) => {
                let salt = self.salt.as_deref().map(decode_salt).transpose()?;
                let key = derive_from_secret(secret.as_bytes(), salt.as_deref())?;
                Ok(KeyRing::single(key))
            }
            (None, Some(material)) => {
                if self.salt.is_some() {
                    log::warn!("`salt` is only used together with `secret`, ignoring it");
                }
                sanitize_keys(&material.to_list())
            }
        }
    }
}

/// Validated configuration shared by every request
#[derive(Clone)]
pub struct SessionConfig {
    codec: TokenCodec,
    cookie_name: String,
    cookie: CookieOptions,
    store: Option<Arc<dyn SessionStore>>,
    ttl: Duration,
    store_timeout: Duration,
    save_uninitialized: bool,
}

impl SessionConfig {
    /// Stateless configuration with default cookie settings
    #[must_use]
    pub fn new(keys: KeyRing) -> Self {
        Self {
            codec: TokenCodec::new(keys),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie: CookieOptions::recommended(),
            store: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            save_uninitialized: true,
        }
    }

    /// Validate operator options
    ///
    /// # Errors
    ///
    /// Returns an error if the key configuration is invalid, see
    /// [`SessionOptions::key_ring`].
    pub fn from_options(options: &SessionOptions) -> Result<Self, ConfigurationError> {
        let keys = options.key_ring()?;
        Ok(Self::new(keys)
            .with_cookie_name(options.cookie_name.clone())
            .with_cookie_options(options.cookie.merged_over(&CookieOptions::recommended()))
            .with_ttl(Duration::from_secs(options.ttl_seconds))
            .with_max_token_bytes(options.max_token_bytes)
            .with_store_timeout(Duration::from_millis(options.store_timeout_ms))
            .with_save_uninitialized(options.save_uninitialized))
    }

    /// Switch to store-backed mode
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_cookie_options(mut self, cookie: CookieOptions) -> Self {
        self.cookie = cookie;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_token_bytes(mut self, max_token_bytes: usize) -> Self {
        self.codec = self.codec.with_max_token_bytes(max_token_bytes);
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_save_uninitialized(mut self, save_uninitialized: bool) -> Self {
        self.save_uninitialized = save_uninitialized;
        self
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn cookie_options(&self) -> &CookieOptions {
        &self.cookie
    }

    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.store.as_ref()
    }

    #[must_use]
    pub fn is_store_backed(&self) -> bool {
        self.store.is_some()
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    #[must_use]
    pub fn save_uninitialized(&self) -> bool {
        self.save_uninitialized
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("keys", self.codec.keys())
            .field("max_token_bytes", &self.codec.max_token_bytes())
            .field("cookie_name", &self.cookie_name)
            .field("cookie", &self.cookie)
            .field("store_backed", &self.is_store_backed())
            .field("ttl", &self.ttl)
            .field("store_timeout", &self.store_timeout)
            .field("save_uninitialized", &self.save_uninitialized)
            .finish()
    }
}
