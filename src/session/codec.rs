//! Token codec: payload <-> cookie-safe text.
//!
//! A token is three independently base64url-encoded components joined by `.`:
//!
//! ```text
//! base64url(nonce) . base64url(ciphertext || tag) . base64url(key_index)
//! ```
//!
//! `.` is outside the base64url alphabet, so splitting is unambiguous. The key
//! index is only a hint for which key to try first; authenticity comes from the
//! AES-GCM tag alone.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{DecodeError, EncodeError};
use crate::keys::KeyRing;
use crate::utils::crypto::{self, NONCE_SIZE, TAG_SIZE};

/// Separator between token components.
pub const TOKEN_SEPARATOR: char = '.';

/// Default ceiling for inbound and outbound tokens, in bytes.
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 4096;

const COMPONENT_COUNT: usize = 3;

/// Result of a successful decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub payload: T,
    /// Index of the key that authenticated the token.
    pub key_index: usize,
}

impl<T> Decoded<T> {
    /// `false` means the token was sealed with a legacy key and should be
    /// re-issued under the active one.
    #[must_use]
    pub fn matched_active_key(&self) -> bool {
        self.key_index == 0
    }
}

/// Encrypts and decrypts tokens with a fixed key ring.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    keys: KeyRing,
    max_token_bytes: usize,
}

impl TokenCodec {
    #[must_use]
    pub fn new(keys: KeyRing) -> Self {
        Self {
            keys,
            max_token_bytes: DEFAULT_MAX_TOKEN_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_token_bytes(mut self, max_token_bytes: usize) -> Self {
        self.max_token_bytes = max_token_bytes;
        self
    }

    #[must_use]
    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    #[must_use]
    pub fn max_token_bytes(&self) -> usize {
        self.max_token_bytes
    }

    /// Serialize `payload` as JSON and seal it under the active key.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Serialization fails
    /// - AES encryption fails
    /// - The resulting token exceeds the configured ceiling
    pub fn encode<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, EncodeError> {
        let plaintext =
            serde_json::to_vec(payload).map_err(|e| EncodeError::Serialization(e.to_string()))?;

        let nonce = crypto::generate_nonce();
        let ciphertext = crypto::seal(&plaintext, &nonce, self.keys.active().as_bytes())
            .ok_or(EncodeError::Encryption)?;

        // The active key always sits at index 0
        let token = format!(
            "{}{TOKEN_SEPARATOR}{}{TOKEN_SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(nonce),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode([0u8]),
        );

        if token.len() > self.max_token_bytes {
            return Err(EncodeError::Oversized {
                len: token.len(),
                limit: self.max_token_bytes,
            });
        }

        Ok(token)
    }

    /// Authenticate, decrypt and deserialize a token.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The token is empty, has the wrong shape or bad base64 (`Malformed`)
    /// - The token exceeds the configured ceiling (`Oversized`)
    /// - No configured key authenticates it (`Unauthenticated`)
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<Decoded<T>, DecodeError> {
        if token.is_empty() {
            return Err(DecodeError::Malformed);
        }
        if token.len() > self.max_token_bytes {
            return Err(DecodeError::Oversized {
                len: token.len(),
                limit: self.max_token_bytes,
            });
        }

        let components: Vec<&str> = token.split(TOKEN_SEPARATOR).collect();
        if components.len() != COMPONENT_COUNT {
            return Err(DecodeError::Malformed);
        }
        let (nonce, ciphertext, marker) = (components[0], components[1], components[2]);

        let nonce: [u8; NONCE_SIZE] = decode_component(nonce)?
            .try_into()
            .map_err(|_| DecodeError::Malformed)?;
        let ciphertext = decode_component(ciphertext)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(DecodeError::Malformed);
        }
        let [marker]: [u8; 1] = decode_component(marker)?
            .try_into()
            .map_err(|_| DecodeError::Malformed)?;

        for index in self.keys.candidate_order(Some(usize::from(marker))) {
            let Some(key) = self.keys.get(index) else {
                continue;
            };
            if let Some(plaintext) = crypto::open(&ciphertext, &nonce, key.as_bytes()) {
                let payload =
                    serde_json::from_slice(&plaintext).map_err(|_| DecodeError::Malformed)?;
                return Ok(Decoded {
                    payload,
                    key_index: index,
                });
            }
        }

        Err(DecodeError::Unauthenticated)
    }
}

fn decode_component(component: &str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_NO_PAD
        .decode(component)
        .map_err(|_| DecodeError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::sanitize_keys;
    use serde_json::{json, Value};

    const KEY_NEW: &str = "0123456789abcdef0123456789abcdef";
    const KEY_OLD: &str = "fedcba9876543210fedcba9876543210";

    fn codec(keys: &[&str]) -> TokenCodec {
        TokenCodec::new(sanitize_keys(keys).unwrap())
    }

    #[test]
    fn test_token_has_three_cookie_safe_components() {
        let token = codec(&[KEY_NEW]).encode(&json!({"uid": 42})).unwrap();

        assert_eq!(token.split(TOKEN_SEPARATOR).count(), 3);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_roundtrip_active_key() {
        let codec = codec(&[KEY_NEW]);
        let token = codec.encode(&json!({"uid": 42})).unwrap();

        let decoded: Decoded<Value> = codec.decode(&token).unwrap();
        assert_eq!(decoded.payload, json!({"uid": 42}));
        assert!(decoded.matched_active_key());
    }

    #[test]
    fn test_fresh_nonce_per_encoding() {
        let codec = codec(&[KEY_NEW]);
        let first = codec.encode(&json!({"uid": 42})).unwrap();
        let second = codec.encode(&json!({"uid": 42})).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_legacy_key_is_reported() {
        let old_token = codec(&[KEY_OLD]).encode(&json!({"uid": 7})).unwrap();

        let decoded: Decoded<Value> = codec(&[KEY_NEW, KEY_OLD]).decode(&old_token).unwrap();
        assert_eq!(decoded.payload, json!({"uid": 7}));
        assert_eq!(decoded.key_index, 1);
        assert!(!decoded.matched_active_key());
    }

    #[test]
    fn test_unknown_key_is_unauthenticated() {
        let token = codec(&[KEY_OLD]).encode(&json!({"uid": 7})).unwrap();
        let result = codec(&[KEY_NEW]).decode::<Value>(&token);
        assert_eq!(result.unwrap_err(), DecodeError::Unauthenticated);
    }

    #[test]
    fn test_empty_token_is_malformed() {
        let result = codec(&[KEY_NEW]).decode::<Value>("");
        assert_eq!(result.unwrap_err(), DecodeError::Malformed);
    }

    #[test]
    fn test_wrong_component_count_is_malformed() {
        let codec = codec(&[KEY_NEW]);
        for token in ["abc", "abc.def", "a.b.c.d", "...."] {
            assert_eq!(
                codec.decode::<Value>(token).unwrap_err(),
                DecodeError::Malformed,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let codec = codec(&[KEY_NEW]);
        let token = codec.encode(&json!({"uid": 42})).unwrap();
        let parts: Vec<&str> = token.split(TOKEN_SEPARATOR).collect();

        let bad = format!("{}.{}.{}", parts[0], "not*base64", parts[2]);
        assert_eq!(codec.decode::<Value>(&bad).unwrap_err(), DecodeError::Malformed);
    }

    #[test]
    fn test_bad_marker_is_malformed() {
        let codec = codec(&[KEY_NEW]);
        let token = codec.encode(&json!({"uid": 42})).unwrap();
        let parts: Vec<&str> = token.split(TOKEN_SEPARATOR).collect();

        let two_byte_marker = URL_SAFE_NO_PAD.encode([0u8, 0u8]);
        let bad = format!("{}.{}.{}", parts[0], parts[1], two_byte_marker);
        assert_eq!(codec.decode::<Value>(&bad).unwrap_err(), DecodeError::Malformed);
    }

    #[test]
    fn test_out_of_range_marker_still_tries_all_keys() {
        let codec = codec(&[KEY_NEW]);
        let token = codec.encode(&json!({"uid": 42})).unwrap();
        let parts: Vec<&str> = token.split(TOKEN_SEPARATOR).collect();

        let marker = URL_SAFE_NO_PAD.encode([200u8]);
        let retagged = format!("{}.{}.{}", parts[0], parts[1], marker);
        let decoded: Decoded<Value> = codec.decode(&retagged).unwrap();
        assert!(decoded.matched_active_key());
    }

    #[test]
    fn test_oversized_token_rejected_before_decoding() {
        let codec = codec(&[KEY_NEW]).with_max_token_bytes(64);
        let token = "A".repeat(65);
        assert_eq!(
            codec.decode::<Value>(&token).unwrap_err(),
            DecodeError::Oversized { len: 65, limit: 64 }
        );
    }

    #[test]
    fn test_oversized_encoding_rejected() {
        let codec = codec(&[KEY_NEW]).with_max_token_bytes(64);
        let err = codec.encode(&json!({"blob": "x".repeat(200)})).unwrap_err();
        assert!(matches!(err, EncodeError::Oversized { limit: 64, .. }));
    }

    #[test]
    fn test_authenticated_but_wrong_shape_is_malformed() {
        let codec = codec(&[KEY_NEW]);
        let token = codec.encode("just-a-string").unwrap();
        assert_eq!(
            codec.decode::<serde_json::Map<String, Value>>(&token).unwrap_err(),
            DecodeError::Malformed
        );
    }
}
