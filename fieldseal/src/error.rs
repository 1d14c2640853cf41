//! Error types for `fieldseal` operations.

use std::fmt;

/// Main error type for `fieldseal` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key for a document could not be resolved
    #[error("key resolution failed: {0}")]
    KeyResolution(#[from] KeyResolutionError),

    /// Authenticated decryption failed (data may be corrupted, tampered, or sealed under another key)
    #[error("integrity check failed: ciphertext may be corrupted or sealed under a different key")]
    Integrity,

    /// Attribute metadata is malformed or missing
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Reflective property access failed
    #[error("cannot access {type_name}.{attribute}: {reason}")]
    PropertyAccess {
        /// Type the attribute was looked up on
        type_name: String,
        /// Attribute name
        attribute: String,
        /// What went wrong
        reason: String,
    },

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Field key derivation failed
    #[error("field key derivation failed")]
    KeyDerivation,
}

impl Error {
    /// Shorthand for an access error on an attribute the entity does not expose.
    #[must_use]
    pub fn unknown_attribute(type_name: &str, attribute: &str) -> Self {
        Self::PropertyAccess {
            type_name: type_name.to_string(),
            attribute: attribute.to_string(),
            reason: "no such attribute".to_string(),
        }
    }
}

/// Errors raised while reading attribute metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// No declaration registered for the type
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A declaration names a parent that was never registered
    #[error("type {type_name} extends unknown type {parent}")]
    UnknownParent {
        /// Declaring type
        type_name: String,
        /// Missing parent
        parent: String,
    },

    /// The ancestry chain loops back on itself
    #[error("inheritance cycle through {0}")]
    InheritanceCycle(String),

    /// An attribute is marked both encrypted and embedded
    #[error("{type_name}.{attribute} is marked both encrypted and embedded")]
    ConflictingMarkers {
        /// Declaring type
        type_name: String,
        /// Attribute name
        attribute: String,
    },
}

/// Errors specific to resolving a document's symmetric key.
#[derive(Debug)]
pub enum KeyResolutionError {
    /// No key-bearing document is reachable from the entity
    DocumentUnreachable(String),

    /// The document carries no stored key
    MissingKeyMaterial(String),

    /// The stored key could not be parsed
    InvalidKeyMaterial {
        /// Document identity
        document: String,
        /// Parse failure
        reason: String,
    },

    /// No acting principal in the current unit of work
    PrincipalMissing,

    /// The acting principal has no usable public key
    PrincipalKeyUnavailable(String),

    /// The process's private unwrapping key is unavailable
    PrivateKeyUnavailable(String),

    /// The wrapped document key did not open
    UnwrapFailed(String),
}

impl fmt::Display for KeyResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentUnreachable(ty) => write!(f, "no document reachable from {ty}"),
            Self::MissingKeyMaterial(doc) => write!(f, "document {doc} has no encryption key"),
            Self::InvalidKeyMaterial { document, reason } => {
                write!(f, "invalid key material on document {document}: {reason}")
            }
            Self::PrincipalMissing => write!(f, "no acting principal"),
            Self::PrincipalKeyUnavailable(id) => {
                write!(f, "principal {id} has no usable public key")
            }
            Self::PrivateKeyUnavailable(msg) => write!(f, "private key unavailable: {msg}"),
            Self::UnwrapFailed(doc) => write!(f, "failed to unwrap key for document {doc}"),
        }
    }
}

impl std::error::Error for KeyResolutionError {}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
