//! Document keys, per-document key derivation and asymmetric key wrapping.
//!
//! Each key-bearing document owns a 32-byte symmetric key. Field ciphertexts
//! are not sealed with that key directly: a field key is derived from it with
//! HKDF-SHA256, using the document identity as `info`, so two documents that
//! somehow share key material still produce unrelated ciphertexts.
//!
//! In the user-keyed strategy the document key is stored wrapped in a
//! `crypto_box` (X25519 + XSalsa20-Poly1305) sealed between the acting user's
//! key pair and the process's key pair.

use crate::error::{Error, KeyResolutionError};
use crypto_box::{
    aead::{generic_array::GenericArray, Aead, AeadCore, OsRng},
    PublicKey, SalsaBox, SecretKey,
};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Document key size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size of the `crypto_box` wrapping (192 bits).
pub const WRAP_NONCE_SIZE: usize = 24;

const FIELD_KEY_INFO: &str = "fieldseal:field-key:";

/// Stable identity of a key-bearing document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an identity scoped to the document's type, `Type#id`.
    ///
    /// Row ids are usually unique per type only, so two document types
    /// sharing an id must still resolve to distinct keys.
    ///
    /// ```
    /// use fieldseal::keys::DocumentId;
    ///
    /// assert_eq!(DocumentId::scoped("Account", 7).as_str(), "Account#7");
    /// ```
    #[must_use]
    pub fn scoped(type_name: &str, id: impl fmt::Display) -> Self {
        Self(format!("{type_name}#{id}"))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A document's unwrapped symmetric key.
pub struct DocumentKey(SecretVec<u8>);

impl DocumentKey {
    /// Generates a random document key.
    ///
    /// # Example
    ///
    /// ```
    /// use fieldseal::keys::{DocumentKey, KEY_SIZE};
    ///
    /// let key = DocumentKey::generate();
    /// assert_eq!(key.to_hex().len(), KEY_SIZE * 2);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        use crypto_box::aead::rand_core::RngCore;

        let mut bytes = vec![0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(SecretVec::new(bytes))
    }

    /// Builds a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyResolutionError::InvalidKeyMaterial` if `bytes` is not 32 bytes long.
    pub fn from_bytes(document: &DocumentId, bytes: Vec<u8>) -> Result<Self, KeyResolutionError> {
        if bytes.len() != KEY_SIZE {
            let len = bytes.len();
            drop(Zeroizing::new(bytes));
            return Err(KeyResolutionError::InvalidKeyMaterial {
                document: document.to_string(),
                reason: format!("expected {KEY_SIZE} bytes, got {len}"),
            });
        }
        Ok(Self(SecretVec::new(bytes)))
    }

    /// Parses the hex form stored on self-keyed documents.
    ///
    /// # Errors
    ///
    /// Returns `KeyResolutionError::InvalidKeyMaterial` on bad hex or wrong length.
    pub fn from_hex(document: &DocumentId, encoded: &str) -> Result<Self, KeyResolutionError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| {
            KeyResolutionError::InvalidKeyMaterial {
                document: document.to_string(),
                reason: format!("invalid hex: {e}"),
            }
        })?;
        Self::from_bytes(document, bytes)
    }

    /// Encodes the key as lowercase hex, the form stored on self-keyed documents.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.expose_secret())
    }

    /// Derives the AEAD key used for this document's field values.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if HKDF expansion fails.
    pub fn field_key(&self, document: &DocumentId) -> Result<Zeroizing<[u8; KEY_SIZE]>, Error> {
        let hkdf = Hkdf::<Sha256>::new(None, self.0.expose_secret());
        let info = format!("{FIELD_KEY_INFO}{document}");

        let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
        hkdf.expand(info.as_bytes(), &mut okm[..]).map_err(|_| Error::KeyDerivation)?;
        Ok(okm)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl Clone for DocumentKey {
    fn clone(&self) -> Self {
        Self(SecretVec::new(self.0.expose_secret().clone()))
    }
}

impl fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DocumentKey").field(&"[REDACTED]").finish()
    }
}

/// Parses a hex-encoded X25519 public key.
///
/// # Errors
///
/// Returns the hex or length problem as a string.
pub fn parse_public_key(encoded: &str) -> Result<PublicKey, String> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| format!("invalid hex: {e}"))?;
    let arr: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected {KEY_SIZE} bytes, got {}", b.len()))?;
    Ok(PublicKey::from(arr))
}

/// Parses a hex-encoded X25519 secret key.
///
/// # Errors
///
/// Returns the hex or length problem as a string.
pub fn parse_secret_key(encoded: &str) -> Result<SecretKey, String> {
    let bytes = Zeroizing::new(
        hex::decode(encoded.trim()).map_err(|e| format!("invalid hex: {e}"))?,
    );
    if bytes.len() != KEY_SIZE {
        return Err(format!("expected {KEY_SIZE} bytes, got {}", bytes.len()));
    }
    let mut arr = Zeroizing::new([0u8; KEY_SIZE]);
    arr.copy_from_slice(&bytes);
    Ok(SecretKey::from(*arr))
}

/// Wraps a document key for storage on a user-keyed document.
///
/// The box is sealed with the acting user's secret key for the process's
/// public key; [`unwrap_document_key`] opens it with the process's secret key
/// and the user's public key.
///
/// # Errors
///
/// Returns `KeyResolutionError::UnwrapFailed` if the box cannot be sealed.
pub fn wrap_document_key(
    key: &DocumentKey,
    sender_secret: &SecretKey,
    recipient_public: &PublicKey,
) -> Result<String, KeyResolutionError> {
    let salsa = SalsaBox::new(recipient_public, sender_secret);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let sealed = salsa
        .encrypt(&nonce, key.expose())
        .map_err(|_| KeyResolutionError::UnwrapFailed("wrap".to_string()))?;

    let mut out = Vec::with_capacity(WRAP_NONCE_SIZE + sealed.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);
    Ok(hex::encode(out))
}

/// Opens a wrapped document key.
///
/// # Errors
///
/// Returns `KeyResolutionError::InvalidKeyMaterial` for malformed input and
/// `KeyResolutionError::UnwrapFailed` if the box does not authenticate.
pub fn unwrap_document_key(
    document: &DocumentId,
    wrapped: &str,
    recipient_secret: &SecretKey,
    sender_public: &PublicKey,
) -> Result<DocumentKey, KeyResolutionError> {
    let bytes = hex::decode(wrapped.trim()).map_err(|e| KeyResolutionError::InvalidKeyMaterial {
        document: document.to_string(),
        reason: format!("invalid hex: {e}"),
    })?;
    if bytes.len() <= WRAP_NONCE_SIZE {
        return Err(KeyResolutionError::InvalidKeyMaterial {
            document: document.to_string(),
            reason: "wrapped key truncated".to_string(),
        });
    }

    let (nonce, sealed) = bytes.split_at(WRAP_NONCE_SIZE);
    let salsa = SalsaBox::new(sender_public, recipient_secret);
    let opened = salsa
        .decrypt(GenericArray::from_slice(nonce), sealed)
        .map_err(|_| KeyResolutionError::UnwrapFailed(document.to_string()))?;

    DocumentKey::from_bytes(document, opened)
}
