//! Reflective access to persisted entities.
//!
//! The interceptor never touches struct fields directly. It reads and writes
//! attributes by name through [`Entity`], which is either implemented by hand
//! or generated with `#[derive(Entity)]`.

use crate::error::Error;
use crate::keys::DocumentId;

/// Snapshot of the document that owns an entity's encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBearer {
    id: DocumentId,
    stored_key: Option<String>,
}

impl KeyBearer {
    /// Creates a key-bearer snapshot.
    ///
    /// `stored_key` is the document's persisted key: hex key material for
    /// self-keyed documents, a wrapped key for user-keyed ones.
    #[must_use]
    pub fn new(id: impl Into<DocumentId>, stored_key: Option<String>) -> Self {
        Self { id: id.into(), stored_key }
    }

    /// Creates a snapshot whose identity is scoped to the document's type.
    ///
    /// See [`DocumentId::scoped`].
    #[must_use]
    pub fn scoped(type_name: &str, id: impl std::fmt::Display, stored_key: Option<String>) -> Self {
        Self { id: DocumentId::scoped(type_name, id), stored_key }
    }

    /// Returns the document identity.
    #[must_use]
    pub const fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Returns the persisted key, if any.
    #[must_use]
    pub fn stored_key(&self) -> Option<&str> {
        self.stored_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for KeyBearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBearer")
            .field("id", &self.id)
            .field("stored_key", &self.stored_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A persisted object whose attributes can be read and written by name.
///
/// Accessors must work uniformly across the type's ancestry: an attribute
/// declared on an ancestor is reachable through the subtype.
pub trait Entity {
    /// Runtime type name. For a lazy-loading proxy this is the proxy's name.
    fn type_name(&self) -> &str;

    /// Name of the proxied type, for lazy-loading proxies.
    fn proxied_type(&self) -> Option<&str> {
        None
    }

    /// The document owning this entity's key. A document returns itself.
    fn key_bearer(&self) -> Option<KeyBearer> {
        None
    }

    /// Reads a string attribute.
    ///
    /// # Errors
    ///
    /// Returns `Error::PropertyAccess` if the attribute does not exist.
    fn get(&self, attribute: &str) -> Result<Option<String>, Error>;

    /// Writes a string attribute.
    ///
    /// # Errors
    ///
    /// Returns `Error::PropertyAccess` if the attribute does not exist.
    fn set(&mut self, attribute: &str, value: Option<String>) -> Result<(), Error>;

    /// Borrows an embedded object, `None` when the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::PropertyAccess` if the attribute does not exist.
    fn embedded_mut(&mut self, attribute: &str) -> Result<Option<&mut dyn Entity>, Error> {
        Err(Error::unknown_attribute(self.type_name(), attribute))
    }
}

/// Resolves the concrete type of an entity, looking through proxies.
#[must_use]
pub fn resolve_type(entity: &dyn Entity) -> &str {
    entity.proxied_type().unwrap_or_else(|| entity.type_name())
}
