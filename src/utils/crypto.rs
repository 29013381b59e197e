// Cryptographic primitives backing session tokens and identifiers

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

/// Nonce size for AES-256-GCM encryption (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Encryption key size for AES-256 (256 bits)
pub const ENCRYPTION_KEY_SIZE: usize = 32;

/// Authentication tag appended to every AES-GCM ciphertext (128 bits)
pub const TAG_SIZE: usize = 16;

/// Random bytes behind a store-backed session identifier (192 bits)
pub const SESSION_ID_BYTES: usize = 24;

/// Generate a cryptographically secure session identifier
///
/// 24 bytes of entropy, `Base64URL` encoded to 32 characters. The identifier
/// only ever travels inside an encrypted token.
#[must_use]
pub fn generate_session_id() -> String {
    let mut id = [0u8; SESSION_ID_BYTES];
    rand::rng().fill_bytes(&mut id);
    general_purpose::URL_SAFE_NO_PAD.encode(id)
}

/// Generate a fresh random nonce for one encryption
#[must_use]
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with AES-256-GCM
///
/// Returns the ciphertext with the authentication tag appended, or `None` if
/// the cipher rejects the input (only possible for absurdly large plaintexts).
#[must_use]
pub fn seal(
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; ENCRYPTION_KEY_SIZE],
) -> Option<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher.encrypt(Nonce::from_slice(nonce), plaintext).ok()
}

/// Verify and decrypt `ciphertext` (tag included) under `key`
///
/// Returns `None` when the tag does not verify; callers treat that as "try the
/// next key", never as a hard failure.
#[must_use]
pub fn open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; ENCRYPTION_KEY_SIZE],
) -> Option<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
}
