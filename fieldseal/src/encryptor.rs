//! Encryptors: key resolution strategies on top of the field cipher.
//!
//! Every operation first finds the key-bearing document reachable from the
//! owner entity, resolves that document's symmetric key through the
//! [`SessionContext`] cache, then seals or opens the value.
//!
//! Two strategies exist:
//!
//! - [`SelfKeyedEncryptor`]: the document stores its key as hex.
//! - [`UserKeyedEncryptor`]: the document stores its key wrapped in a
//!   `crypto_box` between the acting principal's key pair and the process's
//!   key pair, obtained from a [`KeyProvider`].

use crate::cipher;
use crate::context::{Principal, SessionContext};
use crate::entity::{resolve_type, Entity, KeyBearer};
use crate::error::{Error, KeyResolutionError};
use crate::key_provider::KeyProvider;
use crate::keys::{parse_public_key, unwrap_document_key, DocumentKey};
use crate::marker::Ciphertext;
use std::sync::Arc;

/// Finds the key-bearing document of an entity.
///
/// # Errors
///
/// Returns `KeyResolutionError::DocumentUnreachable` if the entity has none.
pub fn document_of(owner: &dyn Entity) -> Result<KeyBearer, KeyResolutionError> {
    owner
        .key_bearer()
        .ok_or_else(|| KeyResolutionError::DocumentUnreachable(resolve_type(owner).to_string()))
}

/// Seals and opens field values for entities.
pub trait Encryptor: Send + Sync {
    /// Short strategy name, for diagnostics.
    fn strategy(&self) -> &'static str;

    /// Resolves the symmetric key of `document`.
    ///
    /// Called at most once per document per unit of work; the result is
    /// cached in the [`SessionContext`].
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyResolution` if the key cannot be produced.
    fn resolve_key(&self, document: &KeyBearer, principal: Option<&Principal>) -> Result<DocumentKey, Error>;

    /// Seals `plaintext` with the key of `document`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyResolution` or `Error::EncryptionFailed`.
    fn encrypt_for(&self, document: &KeyBearer, plaintext: &str, cx: &mut SessionContext) -> Result<Ciphertext, Error> {
        let key = cx.key_or_resolve(document.id(), |principal| self.resolve_key(document, principal))?;
        cipher::seal(key, document.id(), plaintext)
    }

    /// Opens `ciphertext` with the key of `document`.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyResolution`, or `Error::Integrity` if the ciphertext
    /// does not authenticate.
    fn decrypt_for(&self, document: &KeyBearer, ciphertext: &Ciphertext, cx: &mut SessionContext) -> Result<String, Error> {
        let key = cx.key_or_resolve(document.id(), |principal| self.resolve_key(document, principal))?;
        cipher::open(key, document.id(), ciphertext)
    }

    /// Seals `plaintext` for the document reachable from `owner`.
    ///
    /// # Errors
    ///
    /// See [`encrypt_for`](Self::encrypt_for); also fails if no document is reachable.
    fn encrypt(&self, owner: &dyn Entity, plaintext: &str, cx: &mut SessionContext) -> Result<Ciphertext, Error> {
        let document = document_of(owner)?;
        self.encrypt_for(&document, plaintext, cx)
    }

    /// Opens `ciphertext` for the document reachable from `owner`.
    ///
    /// # Errors
    ///
    /// See [`decrypt_for`](Self::decrypt_for); also fails if no document is reachable.
    fn decrypt(&self, owner: &dyn Entity, ciphertext: &Ciphertext, cx: &mut SessionContext) -> Result<String, Error> {
        let document = document_of(owner)?;
        self.decrypt_for(&document, ciphertext, cx)
    }
}

/// Encryptor for documents that store their own key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfKeyedEncryptor;

impl SelfKeyedEncryptor {
    /// Creates the encryptor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Encryptor for SelfKeyedEncryptor {
    fn strategy(&self) -> &'static str {
        "self_keyed"
    }

    fn resolve_key(&self, document: &KeyBearer, _principal: Option<&Principal>) -> Result<DocumentKey, Error> {
        let stored = document
            .stored_key()
            .ok_or_else(|| KeyResolutionError::MissingKeyMaterial(document.id().to_string()))?;
        Ok(DocumentKey::from_hex(document.id(), stored)?)
    }
}

/// Encryptor for documents whose key is wrapped for the acting principal.
pub struct UserKeyedEncryptor<P: KeyProvider> {
    provider: Arc<P>,
}

impl<P: KeyProvider> UserKeyedEncryptor<P> {
    /// Creates the encryptor over a provider of the process's private key.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider: Arc::new(provider) }
    }

    /// Returns the key provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: KeyProvider> Clone for UserKeyedEncryptor<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider) }
    }
}

impl<P: KeyProvider> Encryptor for UserKeyedEncryptor<P> {
    fn strategy(&self) -> &'static str {
        "user_keyed"
    }

    fn resolve_key(&self, document: &KeyBearer, principal: Option<&Principal>) -> Result<DocumentKey, Error> {
        let wrapped = document
            .stored_key()
            .ok_or_else(|| KeyResolutionError::MissingKeyMaterial(document.id().to_string()))?;

        let principal = principal.ok_or(KeyResolutionError::PrincipalMissing)?;
        let user_public = principal
            .public_key()
            .and_then(|encoded| parse_public_key(encoded).ok())
            .ok_or_else(|| KeyResolutionError::PrincipalKeyUnavailable(principal.id().to_string()))?;

        let process_secret = self.provider.private_key()?;

        Ok(unwrap_document_key(document.id(), wrapped, &process_secret, &user_public)?)
    }
}
