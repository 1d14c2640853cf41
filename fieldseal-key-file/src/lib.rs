//! File-based key management for `fieldseal`.
//!
//! Provides the [`FileKeyProvider`] used by the user-keyed strategy, key-pair
//! generation for the `fieldseal` CLI, and [`EncryptorConfig`], the
//! serde-friendly way to pick an encryption strategy at startup.
//!
//! Key files hold the lowercase hex encoding of the 32 raw key bytes:
//!
//! ```text
//! keys/
//! ├── public.key   (64 hex chars)
//! └── private.key  (64 hex chars, 0600 permissions)
//! ```

#![warn(clippy::pedantic, clippy::nursery)]

mod config;
mod error;
mod keypair;
mod provider;

pub use config::EncryptorConfig;
pub use error::KeyFileError;
pub use keypair::{read_public_key, KeyPair, KeyPairPaths, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
pub use provider::FileKeyProvider;
