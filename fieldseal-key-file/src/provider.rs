//! A [`KeyProvider`](fieldseal::key_provider::KeyProvider) reading the process private key from disk.

use fieldseal::error::KeyResolutionError;
use fieldseal::key_provider::KeyProvider;
use fieldseal::keys::parse_secret_key;
use crypto_box::SecretKey;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Reads the process's private unwrapping key from a file.
///
/// The file is read on every call; callers cache resolved document keys in
/// their `SessionContext`, so the provider is hit once per document and unit
/// of work at most.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    /// Creates a provider for the private key stored at `path`.
    ///
    /// The file is not touched until the key is first needed.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the private key file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> KeyResolutionError {
        KeyResolutionError::PrivateKeyUnavailable(format!("{}: {reason}", self.path.display()))
    }
}

impl KeyProvider for FileKeyProvider {
    fn private_key(&self) -> Result<SecretKey, KeyResolutionError> {
        let encoded = Zeroizing::new(std::fs::read_to_string(&self.path).map_err(|e| self.unavailable(e))?);
        let key = parse_secret_key(&encoded).map_err(|e| self.unavailable(e))?;
        tracing::debug!(path = %self.path.display(), "loaded private key");
        Ok(key)
    }
}
