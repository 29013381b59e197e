//! Key material for session tokens.
//!
//! Operators configure either a human secret (optionally salted), from which a
//! single key is derived with Argon2id, or one or more raw 32-byte keys. Raw keys
//! form an ordered [`KeyRing`]: index 0 is the active key used for every new
//! token, the rest are legacy keys that are only tried when decoding. Rotating a
//! secret is therefore "prepend the new key, keep the old one around for a while".

use std::fmt;

use argon2::Argon2;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::utils::crypto::ENCRYPTION_KEY_SIZE;

/// Salt length accepted by [`derive_from_secret`].
pub const SALT_SIZE: usize = 16;

/// The key-index marker in a token is a single byte.
pub const MAX_KEYS: usize = 256;

const DEFAULT_SALT: [u8; SALT_SIZE] = [0u8; SALT_SIZE];

/// A single AES-256-GCM key. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; ENCRYPTION_KEY_SIZE]);

impl SecretKey {
    /// Wrap raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidKey` (index 0) if `bytes` is not
    /// exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigurationError> {
        validate_key(0, bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ENCRYPTION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Ordered list of keys; position 0 is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing {
    keys: Vec<SecretKey>,
}

// A ring always holds its active key, so there is no `is_empty`
#[allow(clippy::len_without_is_empty)]
impl KeyRing {
    /// A ring holding one key and no legacy keys.
    #[must_use]
    pub fn single(key: SecretKey) -> Self {
        Self { keys: vec![key] }
    }

    /// The key used for all new encodings.
    #[must_use]
    pub fn active(&self) -> &SecretKey {
        // Construction guarantees at least one key.
        &self.keys[0]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SecretKey> {
        self.keys.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Order in which keys are tried when decoding.
    ///
    /// A valid `preferred` index (taken from the token's own marker) comes
    /// first, followed by every other key in configuration order.
    #[must_use]
    pub fn candidate_order(&self, preferred: Option<usize>) -> Vec<usize> {
        let preferred = preferred.filter(|&index| index < self.keys.len());
        let mut order = Vec::with_capacity(self.keys.len());
        order.extend(preferred);
        order.extend((0..self.keys.len()).filter(|&index| Some(index) != preferred));
        order
    }
}

/// Raw key configuration: a single key or an ordered list.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyMaterial {
    One(String),
    Many(Vec<String>),
}

impl KeyMaterial {
    /// Normalize to an ordered list, active key first.
    #[must_use]
    pub fn to_list(&self) -> Vec<&[u8]> {
        match self {
            Self::One(key) => vec![key.as_bytes()],
            Self::Many(keys) => keys.iter().map(String::as_bytes).collect(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(_) => f.write_str("KeyMaterial::One([REDACTED])"),
            Self::Many(keys) => write!(f, "KeyMaterial::Many([REDACTED; {}])", keys.len()),
        }
    }
}

/// Derive one key from an operator secret with Argon2id.
///
/// The same `(secret, salt)` pair always yields the same key, so processes that
/// share a secret can read each other's tokens. Without a salt a fixed all-zero
/// salt is used.
///
/// # Errors
///
/// Returns an error if:
/// - `secret` is empty
/// - `salt` is not exactly 16 bytes
/// - Argon2 rejects the inputs
pub fn derive_from_secret(
    secret: &[u8],
    salt: Option<&[u8]>,
) -> Result<SecretKey, ConfigurationError> {
    if secret.is_empty() {
        return Err(ConfigurationError::EmptySecret);
    }

    let salt = salt.unwrap_or(&DEFAULT_SALT);
    if salt.len() != SALT_SIZE {
        return Err(ConfigurationError::InvalidSalt(format!(
            "expected {SALT_SIZE} bytes, got {}",
            salt.len()
        )));
    }

    let mut key = [0u8; ENCRYPTION_KEY_SIZE];
    Argon2::default()
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| ConfigurationError::KeyDerivation(e.to_string()))?;

    Ok(SecretKey(key))
}

/// Decode a base64 salt as found in configuration files.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidSalt` if the value is not valid base64.
pub fn decode_salt(encoded: &str) -> Result<Vec<u8>, ConfigurationError> {
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| ConfigurationError::InvalidSalt(e.to_string()))
}

/// Validate raw keys and build a [`KeyRing`], preserving order.
///
/// # Errors
///
/// Returns an error if:
/// - No keys are given
/// - More than 256 keys are given
/// - Any key is not exactly 32 bytes (the error names its index)
pub fn sanitize_keys<K: AsRef<[u8]>>(keys: &[K]) -> Result<KeyRing, ConfigurationError> {
    if keys.is_empty() {
        return Err(ConfigurationError::NoKeys);
    }
    if keys.len() > MAX_KEYS {
        return Err(ConfigurationError::TooManyKeys {
            count: keys.len(),
            max: MAX_KEYS,
        });
    }

    let keys = keys
        .iter()
        .enumerate()
        .map(|(index, key)| validate_key(index, key.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(KeyRing { keys })
}

fn validate_key(index: usize, bytes: &[u8]) -> Result<SecretKey, ConfigurationError> {
    let key: [u8; ENCRYPTION_KEY_SIZE] =
        bytes.try_into().map_err(|_| ConfigurationError::InvalidKey {
            index,
            expected: ENCRYPTION_KEY_SIZE,
            actual: bytes.len(),
        })?;
    Ok(SecretKey(key))
}
