//! Property selection: the ordered encrypted/embedded attributes of a type.
//!
//! Selection walks the declared ancestry and lists ancestor attributes before
//! the type's own. An attribute redeclared by a subtype keeps the ancestor's
//! position and takes the subtype's markers. Results are cached per type for
//! the life of the selector, since metadata does not change at runtime.

use crate::error::MetadataError;
use crate::metadata::MetadataSource;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// How the interceptor treats a selected attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// A string attribute sealed and opened in place
    PlainEncrypted,
    /// A nested object whose own attributes are processed recursively
    Embedded,
}

/// One attribute chosen for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAttribute {
    name: String,
    kind: AttributeKind,
}

impl SelectedAttribute {
    /// Creates a selected attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self { name: name.into(), kind }
    }

    /// Returns the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attribute kind.
    #[must_use]
    pub const fn kind(&self) -> AttributeKind {
        self.kind
    }
}

/// Selects and caches the attributes the interceptor must visit per type.
pub struct PropertySelector {
    source: Arc<dyn MetadataSource>,
    cache: RwLock<HashMap<String, Arc<[SelectedAttribute]>>>,
}

impl PropertySelector {
    /// Creates a selector over a metadata source.
    #[must_use]
    pub fn new(source: impl MetadataSource + 'static) -> Self {
        Self::from_arc(Arc::new(source))
    }

    /// Creates a selector over a shared metadata source.
    #[must_use]
    pub fn from_arc(source: Arc<dyn MetadataSource>) -> Self {
        Self { source, cache: RwLock::new(HashMap::new()) }
    }

    /// Returns the selected attributes for `type_name`.
    ///
    /// # Errors
    ///
    /// Returns a `MetadataError` if the type or an ancestor is undeclared,
    /// the ancestry loops, or an attribute carries both markers.
    pub fn select(&self, type_name: &str) -> Result<Arc<[SelectedAttribute]>, MetadataError> {
        if let Some(hit) =
            self.cache.read().unwrap_or_else(PoisonError::into_inner).get(type_name)
        {
            return Ok(Arc::clone(hit));
        }

        let selected: Arc<[SelectedAttribute]> = self.resolve(type_name)?.into();
        tracing::trace!(type_name, count = selected.len(), "selected encrypted attributes");

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name.to_string(), Arc::clone(&selected));
        Ok(selected)
    }

    /// Resolves and caches a set of types up front.
    ///
    /// # Errors
    ///
    /// Returns the first `MetadataError` encountered.
    pub fn prime<I, S>(&self, types: I) -> Result<(), MetadataError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ty in types {
            self.select(ty.as_ref())?;
        }
        Ok(())
    }

    /// Returns the ancestry of `type_name`, root first.
    fn lineage(&self, type_name: &str) -> Result<Vec<String>, MetadataError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = type_name.to_string();

        loop {
            if !seen.insert(current.clone()) {
                return Err(MetadataError::InheritanceCycle(current));
            }
            let parent = self.source.parent_of(&current).map_err(|err| match (err, chain.last()) {
                (MetadataError::UnknownType(parent), Some(child)) => {
                    MetadataError::UnknownParent { type_name: String::clone(child), parent }
                }
                (err, _) => err,
            })?;
            chain.push(current);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    fn resolve(&self, type_name: &str) -> Result<Vec<SelectedAttribute>, MetadataError> {
        let mut merged: IndexMap<String, Option<AttributeKind>> = IndexMap::new();

        for ty in self.lineage(type_name)? {
            for attribute in self.source.declared_attributes(&ty)? {
                let encrypted = self.source.has_encrypted_marker(&ty, &attribute);
                let embedded = self.source.has_embedded_marker(&ty, &attribute);
                let kind = match (encrypted, embedded) {
                    (true, true) => {
                        return Err(MetadataError::ConflictingMarkers { type_name: ty, attribute });
                    }
                    (true, false) => Some(AttributeKind::PlainEncrypted),
                    (false, true) => Some(AttributeKind::Embedded),
                    (false, false) => None,
                };
                merged.insert(attribute, kind);
            }
        }

        Ok(merged
            .into_iter()
            .filter_map(|(name, kind)| kind.map(|kind| SelectedAttribute { name, kind }))
            .collect())
    }
}

impl std::fmt::Debug for PropertySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.cache.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("PropertySelector").field("cached_types", &cached).finish_non_exhaustive()
    }
}
