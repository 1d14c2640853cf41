//! Unit-of-work context: the acting principal and the resolved-key cache.
//!
//! A [`SessionContext`] lives exactly as long as one unit of work. Keys
//! unwrapped under one principal are cached here and nowhere else, so they
//! cannot leak into a unit of work acting for someone else. Changing the
//! principal clears the cache; dropping the context zeroizes every key.

use crate::error::Error;
use crate::keys::{DocumentId, DocumentKey};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// The user or session on whose behalf keys are unwrapped.
///
/// # Example
///
/// ```
/// use fieldseal::context::Principal;
///
/// let alice = Principal::new("alice").with_public_key("9f0c...");
/// assert_eq!(alice.id(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    id: String,
    public_key: Option<String>,
}

impl Principal {
    /// Creates a principal without a stored public key.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), public_key: None }
    }

    /// Sets the hex-encoded public key from the principal's stored profile.
    #[must_use]
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    /// Returns the principal identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the stored public key, if any.
    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// State scoped to a single unit of work.
#[derive(Debug, Default)]
pub struct SessionContext {
    principal: Option<Principal>,
    keys: HashMap<DocumentId, DocumentKey>,
}

impl SessionContext {
    /// Creates a context with no acting principal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context acting for `principal`.
    #[must_use]
    pub fn for_principal(principal: Principal) -> Self {
        Self { principal: Some(principal), keys: HashMap::new() }
    }

    /// Returns the acting principal.
    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Replaces the acting principal, discarding every cached key.
    pub fn set_principal(&mut self, principal: Option<Principal>) {
        if self.principal != principal {
            self.clear_keys();
        }
        self.principal = principal;
    }

    /// Number of keys currently cached.
    #[must_use]
    pub fn cached_keys(&self) -> usize {
        self.keys.len()
    }

    /// Whether a key for `document` is cached.
    #[must_use]
    pub fn has_key(&self, document: &DocumentId) -> bool {
        self.keys.contains_key(document)
    }

    /// Drops (and zeroizes) every cached key.
    pub fn clear_keys(&mut self) {
        if !self.keys.is_empty() {
            tracing::debug!(count = self.keys.len(), "clearing resolved document keys");
        }
        self.keys.clear();
    }

    /// Returns the cached key for `document`, resolving it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates any error from `resolve`; nothing is cached on failure.
    pub fn key_or_resolve<F>(&mut self, document: &DocumentId, resolve: F) -> Result<&DocumentKey, Error>
    where
        F: FnOnce(Option<&Principal>) -> Result<DocumentKey, Error>,
    {
        match self.keys.entry(document.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let key = resolve(self.principal.as_ref())?;
                tracing::debug!(document = %document, "resolved document key");
                Ok(entry.insert(key))
            }
        }
    }
}
