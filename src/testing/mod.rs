//! Testing utilities for sealed-session
//!
//! Compiled for unit tests and behind the `testing` feature for integration
//! tests.
//!
//! ## Organization
//!
//! - [`fixtures`] - Pre-built keys, configurations and managers
//! - [`mock`] - Store implementations that fail, stall or record calls
//! - [`assertions`] - Assertions over response cookies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sealed_session::testing::{fixtures::TestFixtures, mock::FailingStore};
//!
//! let manager = TestFixtures::store_backed_manager(Arc::new(FailingStore));
//! let session = manager.load_session(None).await;
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock;

// Re-export commonly used items for convenience
pub use assertions::*;
pub use fixtures::TestFixtures;
pub use mock::{FailingStore, RecordingStore, SlowStore, StoreCall};

/// Common test constants
pub mod constants {
    /// Active 32-byte key used throughout the tests
    pub const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

    /// A second valid key, used as the legacy key in rotation tests
    pub const LEGACY_KEY: &str = "fedcba9876543210fedcba9876543210";

    /// A key that no fixture configures
    pub const FOREIGN_KEY: &str = "ffffffffffffffffffffffffffffffff";

    /// Passphrase for secret-derived configurations
    pub const TEST_SECRET: &str = "correct horse battery staple";

    /// Base64 of the bytes 0x00..=0x0f
    pub const TEST_SALT: &str = "AAECAwQFBgcICQoLDA0ODw==";
}
