//! Key provider abstraction for the process's private unwrapping key.

use crate::error::KeyResolutionError;
use crypto_box::{PublicKey, SecretKey};

/// Supplies the private key the process uses to unwrap document keys.
///
/// Implementations must be thread-safe (`Send + Sync`) so an encryptor can be
/// shared between interceptors. Where the key lives is up to the
/// implementation; `fieldseal-key-file` reads it from a configured path.
///
/// # Example
///
/// ```rust,ignore
/// use fieldseal::key_provider::KeyProvider;
///
/// struct VaultAgent;
///
/// impl KeyProvider for VaultAgent {
///     fn private_key(&self) -> Result<SecretKey, KeyResolutionError> {
///         // fetch from the agent socket
///     }
/// }
/// ```
pub trait KeyProvider: Send + Sync {
    /// Loads the private unwrapping key.
    ///
    /// # Errors
    ///
    /// Returns `KeyResolutionError::PrivateKeyUnavailable` if the key cannot be loaded.
    fn private_key(&self) -> Result<SecretKey, KeyResolutionError>;

    /// Returns the public half of the unwrapping key pair.
    ///
    /// # Errors
    ///
    /// Returns `KeyResolutionError::PrivateKeyUnavailable` if the key cannot be loaded.
    fn public_key(&self) -> Result<PublicKey, KeyResolutionError> {
        Ok(self.private_key()?.public_key())
    }
}

/// Key provider holding the private key in memory.
pub struct StaticKeyProvider {
    secret: SecretKey,
}

impl StaticKeyProvider {
    /// Wraps an already loaded private key.
    #[must_use]
    pub const fn new(secret: SecretKey) -> Self {
        Self { secret }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn private_key(&self) -> Result<SecretKey, KeyResolutionError> {
        Ok(self.secret.clone())
    }
}

impl std::fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::aead::OsRng;

    #[test]
    fn test_static_provider_public_key_matches() {
        let secret = SecretKey::generate(&mut OsRng);
        let expected = secret.public_key();
        let provider = StaticKeyProvider::new(secret);

        assert_eq!(provider.public_key().unwrap().as_bytes(), expected.as_bytes());
    }
}
