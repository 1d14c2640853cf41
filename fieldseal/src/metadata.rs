//! Attribute metadata: which attributes are encrypted, which are embedded.
//!
//! [`MetadataSource`] is the contract the property selector consumes.
//! [`MetadataRegistry`] is the in-process implementation, filled from
//! [`TypeDecl`]s written by hand or emitted by `#[derive(Entity)]`.

use crate::error::MetadataError;
use std::collections::HashMap;

/// Source of truth for attribute classification.
pub trait MetadataSource: Send + Sync {
    /// Returns the declared parent of a type.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::UnknownType` if the type is not declared.
    fn parent_of(&self, type_name: &str) -> Result<Option<String>, MetadataError>;

    /// Returns the attributes declared on the type itself, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::UnknownType` if the type is not declared.
    fn declared_attributes(&self, type_name: &str) -> Result<Vec<String>, MetadataError>;

    /// Whether the attribute carries the encrypted marker.
    fn has_encrypted_marker(&self, type_name: &str, attribute: &str) -> bool;

    /// Whether the attribute carries the embedded marker.
    fn has_embedded_marker(&self, type_name: &str, attribute: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeDecl {
    name: String,
    encrypted: bool,
    embedded: bool,
}

/// Declaration of one type's own attributes and its parent.
///
/// # Example
///
/// ```
/// use fieldseal::metadata::TypeDecl;
///
/// let decl = TypeDecl::new("Invoice")
///     .extends("Record")
///     .encrypted("iban")
///     .embedded("billing_address")
///     .plain("number");
/// assert_eq!(decl.name(), "Invoice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    name: String,
    parent: Option<String>,
    attributes: Vec<AttributeDecl>,
}

impl TypeDecl {
    /// Starts a declaration for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parent: None, attributes: Vec::new() }
    }

    /// Sets the parent type.
    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declares an encrypted attribute.
    #[must_use]
    pub fn encrypted(self, attribute: impl Into<String>) -> Self {
        self.attribute(attribute, true, false)
    }

    /// Declares an embedded attribute.
    #[must_use]
    pub fn embedded(self, attribute: impl Into<String>) -> Self {
        self.attribute(attribute, false, true)
    }

    /// Declares an attribute with no marker.
    #[must_use]
    pub fn plain(self, attribute: impl Into<String>) -> Self {
        self.attribute(attribute, false, false)
    }

    /// Declares an attribute with explicit markers.
    ///
    /// Redeclaring a name replaces the earlier entry in place.
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>, encrypted: bool, embedded: bool) -> Self {
        let name = attribute.into();
        let decl = AttributeDecl { name, encrypted, embedded };
        match self.attributes.iter_mut().find(|a| a.name == decl.name) {
            Some(existing) => *existing = decl,
            None => self.attributes.push(decl),
        }
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent type name.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    fn find(&self, attribute: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == attribute)
    }
}

/// A type that can declare its own metadata, usually via `#[derive(Entity)]`.
pub trait Described {
    /// Name the type is registered under.
    const TYPE_NAME: &'static str;

    /// The type's own declaration.
    fn type_decl() -> TypeDecl;

    /// Registers the type and everything it extends.
    fn describe(registry: &mut MetadataRegistry) {
        registry.insert(Self::type_decl());
    }
}

/// In-process metadata store keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    types: HashMap<String, TypeDecl>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a declaration.
    pub fn insert(&mut self, decl: TypeDecl) -> &mut Self {
        self.types.insert(decl.name.clone(), decl);
        self
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, decl: TypeDecl) -> Self {
        self.insert(decl);
        self
    }

    /// Registers a described type together with its ancestors.
    pub fn register<T: Described>(&mut self) -> &mut Self {
        T::describe(self);
        self
    }

    /// Whether a declaration exists for `type_name`.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    fn decl(&self, type_name: &str) -> Result<&TypeDecl, MetadataError> {
        self.types.get(type_name).ok_or_else(|| MetadataError::UnknownType(type_name.to_string()))
    }
}

impl MetadataSource for MetadataRegistry {
    fn parent_of(&self, type_name: &str) -> Result<Option<String>, MetadataError> {
        Ok(self.decl(type_name)?.parent.clone())
    }

    fn declared_attributes(&self, type_name: &str) -> Result<Vec<String>, MetadataError> {
        Ok(self.decl(type_name)?.attributes.iter().map(|a| a.name.clone()).collect())
    }

    fn has_encrypted_marker(&self, type_name: &str, attribute: &str) -> bool {
        self.types.get(type_name).and_then(|d| d.find(attribute)).is_some_and(|a| a.encrypted)
    }

    fn has_embedded_marker(&self, type_name: &str, attribute: &str) -> bool {
        self.types.get(type_name).and_then(|d| d.find(attribute)).is_some_and(|a| a.embedded)
    }
}
