//! Field interceptor: seals and opens encrypted attributes at lifecycle events.
//!
//! For each entity the interceptor resolves the concrete type, selects its
//! encrypted and embedded attributes, and for every plain encrypted attribute
//! decides between skip, seal and open from the value's marker state:
//!
//! | direction | empty | plaintext | marked  |
//! |-----------|-------|-----------|---------|
//! | encrypt   | skip  | seal+mark | skip    |
//! | decrypt   | skip  | skip      | open    |
//!
//! Embedded objects are processed recursively in the same direction. An
//! embedded object with no key-bearing document of its own uses the
//! container's.
//!
//! Processing an entity is all-or-nothing: every new value is computed before
//! any is written back, so a key or integrity failure leaves the entity as it
//! was.
//!
//! With no encryptor configured every callback is a no-op.

use crate::context::SessionContext;
use crate::encryptor::Encryptor;
use crate::entity::{resolve_type, Entity, KeyBearer};
use crate::error::{Error, KeyResolutionError};
use crate::lifecycle::{LifecycleEvent, PreUpdateArgs, UnitOfWork};
use crate::marker::{mark, FieldState};
use crate::metadata::MetadataSource;
use crate::selector::{AttributeKind, PropertySelector};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Which way a processing pass transforms values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Plaintext to marked ciphertext
    Encrypt,
    /// Marked ciphertext to plaintext
    Decrypt,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => f.write_str("encrypt"),
            Self::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// Values computed for one entity, written back only once all succeeded.
#[derive(Default)]
struct Pending {
    writes: Vec<(String, String)>,
    embedded: Vec<(String, Pending)>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.embedded.is_empty()
    }
}

/// Transparent field encryption driven by persistence lifecycle callbacks.
///
/// # Example
///
/// ```rust,ignore
/// let interceptor = FieldInterceptor::new(registry, Some(Arc::new(SelfKeyedEncryptor::new())));
/// let mut cx = SessionContext::for_principal(current_user);
///
/// interceptor.on_flush(&mut unit_of_work, &mut cx)?;
/// // ... commit ...
/// interceptor.post_flush(&mut unit_of_work, &mut cx)?;
/// ```
pub struct FieldInterceptor {
    selector: PropertySelector,
    encryptor: Option<Arc<dyn Encryptor>>,
    configured: Option<Arc<dyn Encryptor>>,
    encrypt_count: AtomicU64,
    decrypt_count: AtomicU64,
}

impl FieldInterceptor {
    /// Creates an interceptor over a metadata source.
    ///
    /// `encryptor` is also remembered as the configured encryptor that
    /// [`restore_encryptor`](Self::restore_encryptor) returns to.
    #[must_use]
    pub fn new(metadata: impl MetadataSource + 'static, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        Self::with_selector(PropertySelector::new(metadata), encryptor)
    }

    /// Creates an interceptor over an existing selector.
    #[must_use]
    pub fn with_selector(selector: PropertySelector, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        Self {
            selector,
            configured: encryptor.clone(),
            encryptor,
            encrypt_count: AtomicU64::new(0),
            decrypt_count: AtomicU64::new(0),
        }
    }

    /// Lifecycle events this interceptor reacts to, in dispatch order.
    #[must_use]
    pub const fn subscribed_events() -> [LifecycleEvent; 5] {
        [
            LifecycleEvent::PreUpdate,
            LifecycleEvent::OnFlush,
            LifecycleEvent::PostUpdate,
            LifecycleEvent::PostLoad,
            LifecycleEvent::PostFlush,
        ]
    }

    /// Returns the property selector.
    #[must_use]
    pub const fn selector(&self) -> &PropertySelector {
        &self.selector
    }

    /// Returns the active encryptor.
    #[must_use]
    pub fn encryptor(&self) -> Option<&Arc<dyn Encryptor>> {
        self.encryptor.as_ref()
    }

    /// Swaps in another encryptor.
    pub fn set_encryptor(&mut self, encryptor: Arc<dyn Encryptor>) {
        debug!(strategy = encryptor.strategy(), "encryptor replaced");
        self.encryptor = Some(encryptor);
    }

    /// Removes the active encryptor, switching to no-op mode.
    pub fn clear_encryptor(&mut self) {
        self.encryptor = None;
    }

    /// Goes back to the encryptor given at construction.
    pub fn restore_encryptor(&mut self) {
        self.encryptor = self.configured.clone();
    }

    /// Number of values sealed so far.
    #[must_use]
    pub fn encrypt_count(&self) -> u64 {
        self.encrypt_count.load(Ordering::Relaxed)
    }

    /// Number of values opened so far.
    #[must_use]
    pub fn decrypt_count(&self) -> u64 {
        self.decrypt_count.load(Ordering::Relaxed)
    }

    /// Resets both counters to zero.
    pub fn reset_counters(&self) {
        self.encrypt_count.store(0, Ordering::Relaxed);
        self.decrypt_count.store(0, Ordering::Relaxed);
    }

    /// Seals every pending plaintext attribute of `entity`.
    ///
    /// # Errors
    ///
    /// See [`process_fields`](Self::process_fields).
    pub fn encrypt_fields(&self, entity: &mut dyn Entity, cx: &mut SessionContext) -> Result<(), Error> {
        self.process_fields(entity, Direction::Encrypt, cx)
    }

    /// Opens every marked attribute of `entity`.
    ///
    /// # Errors
    ///
    /// See [`process_fields`](Self::process_fields).
    pub fn decrypt_fields(&self, entity: &mut dyn Entity, cx: &mut SessionContext) -> Result<(), Error> {
        self.process_fields(entity, Direction::Decrypt, cx)
    }

    /// Runs one processing pass over `entity` and its embedded objects.
    ///
    /// # Errors
    ///
    /// Returns `Error::Metadata` for bad metadata, `Error::KeyResolution` or
    /// `Error::Integrity` from the encryptor, and `Error::PropertyAccess` from
    /// the entity. On error no attribute has been written.
    pub fn process_fields(
        &self,
        entity: &mut dyn Entity,
        direction: Direction,
        cx: &mut SessionContext,
    ) -> Result<(), Error> {
        let Some(encryptor) = self.encryptor.as_deref() else {
            trace!(%direction, "no encryptor configured, leaving entity untouched");
            return Ok(());
        };

        let pending = self.collect(encryptor, entity, direction, None, cx)?;
        if !pending.is_empty() {
            self.apply(entity, pending, direction)?;
        }
        Ok(())
    }

    fn collect(
        &self,
        encryptor: &dyn Encryptor,
        entity: &mut dyn Entity,
        direction: Direction,
        inherited: Option<&KeyBearer>,
        cx: &mut SessionContext,
    ) -> Result<Pending, Error> {
        let type_name = resolve_type(entity).to_string();
        let attributes = self.selector.select(&type_name)?;
        let bearer = entity.key_bearer().or_else(|| inherited.cloned());
        let mut pending = Pending::default();

        for attribute in attributes.iter() {
            let name = attribute.name();

            if attribute.kind() == AttributeKind::Embedded {
                if let Some(child) = entity.embedded_mut(name)? {
                    let nested = self.collect(encryptor, child, direction, bearer.as_ref(), cx)?;
                    if !nested.is_empty() {
                        pending.embedded.push((name.to_string(), nested));
                    }
                }
                continue;
            }

            let document = || {
                bearer
                    .as_ref()
                    .ok_or_else(|| KeyResolutionError::DocumentUnreachable(type_name.clone()))
            };

            match (direction, FieldState::classify(entity.get(name)?)) {
                (Direction::Encrypt, FieldState::Plaintext(plaintext)) => {
                    let ciphertext = encryptor.encrypt_for(document()?, &plaintext, cx)?;
                    trace!(type_name = %type_name, attribute = name, "sealed");
                    pending.writes.push((name.to_string(), mark(ciphertext)));
                }
                (Direction::Decrypt, FieldState::Sealed(ciphertext)) => {
                    let plaintext = encryptor.decrypt_for(document()?, &ciphertext, cx)?;
                    trace!(type_name = %type_name, attribute = name, "opened");
                    pending.writes.push((name.to_string(), plaintext));
                }
                _ => {}
            }
        }

        Ok(pending)
    }

    fn apply(&self, entity: &mut dyn Entity, pending: Pending, direction: Direction) -> Result<(), Error> {
        let counter = match direction {
            Direction::Encrypt => &self.encrypt_count,
            Direction::Decrypt => &self.decrypt_count,
        };

        for (attribute, value) in pending.writes {
            entity.set(&attribute, Some(value))?;
            counter.fetch_add(1, Ordering::Relaxed);
        }

        for (attribute, nested) in pending.embedded {
            if let Some(child) = entity.embedded_mut(&attribute)? {
                self.apply(child, nested, direction)?;
            }
        }
        Ok(())
    }

    /// Pre-update: opens changed values that arrive already marked.
    ///
    /// A caller that round-trips a stored ciphertext back into the entity
    /// would otherwise have it sealed a second time.
    ///
    /// # Errors
    ///
    /// Propagates metadata, key resolution and integrity errors.
    pub fn pre_update(&self, args: &mut dyn PreUpdateArgs, cx: &mut SessionContext) -> Result<(), Error> {
        let Some(encryptor) = self.encryptor.as_deref() else {
            return Ok(());
        };

        let entity = args.entity();
        let type_name = resolve_type(entity).to_string();
        let bearer = entity.key_bearer();
        let attributes = self.selector.select(&type_name)?;

        let mut rewrites = Vec::new();
        for attribute in attributes.iter().filter(|a| a.kind() == AttributeKind::PlainEncrypted) {
            let name = attribute.name();
            if !args.has_changed_field(name) {
                continue;
            }
            if let FieldState::Sealed(ciphertext) = FieldState::classify(args.new_value(name)) {
                let document = bearer
                    .as_ref()
                    .ok_or_else(|| KeyResolutionError::DocumentUnreachable(type_name.clone()))?;
                rewrites.push((name.to_string(), encryptor.decrypt_for(document, &ciphertext, cx)?));
            }
        }

        debug!(type_name = %type_name, reopened = rewrites.len(), "preUpdate");
        for (attribute, plaintext) in rewrites {
            args.set_new_value(&attribute, Some(plaintext));
        }
        Ok(())
    }

    /// On-flush: seals all scheduled updates and insertions, then has the unit
    /// of work recompute each touched change set.
    ///
    /// # Errors
    ///
    /// Propagates the first failure; the unit of work should be aborted.
    pub fn on_flush<U>(&self, uow: &mut U, cx: &mut SessionContext) -> Result<(), Error>
    where
        U: UnitOfWork + ?Sized,
    {
        if self.encryptor.is_none() {
            return Ok(());
        }

        let updates = uow.scheduled_entity_updates();
        let insertions = uow.scheduled_entity_insertions();
        debug!(updates = updates.len(), insertions = insertions.len(), "onFlush");

        for handle in updates.iter().chain(insertions.iter()) {
            let Some(entity) = uow.entity_mut(handle) else {
                warn!(?handle, "scheduled entity missing from unit of work");
                continue;
            };
            self.process_fields(entity, Direction::Encrypt, cx)?;
            uow.recompute_single_entity_change_set(handle)?;
        }
        Ok(())
    }

    /// Post-update: restores plaintext on the updated entity.
    ///
    /// # Errors
    ///
    /// See [`process_fields`](Self::process_fields).
    pub fn post_update(&self, entity: &mut dyn Entity, cx: &mut SessionContext) -> Result<(), Error> {
        self.process_fields(entity, Direction::Decrypt, cx)
    }

    /// Post-load: opens the freshly loaded entity.
    ///
    /// # Errors
    ///
    /// See [`process_fields`](Self::process_fields).
    pub fn post_load(&self, entity: &mut dyn Entity, cx: &mut SessionContext) -> Result<(), Error> {
        self.process_fields(entity, Direction::Decrypt, cx)
    }

    /// Post-flush: opens every entity in the identity map.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn post_flush<U>(&self, uow: &mut U, cx: &mut SessionContext) -> Result<(), Error>
    where
        U: UnitOfWork + ?Sized,
    {
        if self.encryptor.is_none() {
            return Ok(());
        }

        let tracked = uow.identity_map();
        debug!(tracked = tracked.len(), "postFlush");

        for handle in &tracked {
            if let Some(entity) = uow.entity_mut(handle) {
                self.process_fields(entity, Direction::Decrypt, cx)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FieldInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInterceptor")
            .field("selector", &self.selector)
            .field("strategy", &self.encryptor.as_ref().map(|e| e.strategy()))
            .field("encrypt_count", &self.encrypt_count())
            .field("decrypt_count", &self.decrypt_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryptor::SelfKeyedEncryptor;
    use crate::keys::DocumentKey;
    use crate::metadata::{MetadataRegistry, TypeDecl};
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Row {
        values: BTreeMap<String, Option<String>>,
        key: Option<String>,
    }

    impl Entity for Row {
        fn type_name(&self) -> &str {
            "Row"
        }

        fn key_bearer(&self) -> Option<KeyBearer> {
            self.key.as_ref().map(|k| KeyBearer::new("row-doc", Some(k.clone())))
        }

        fn get(&self, attribute: &str) -> Result<Option<String>, Error> {
            self.values
                .get(attribute)
                .cloned()
                .ok_or_else(|| Error::unknown_attribute("Row", attribute))
        }

        fn set(&mut self, attribute: &str, value: Option<String>) -> Result<(), Error> {
            self.values.insert(attribute.to_string(), value);
            Ok(())
        }
    }

    fn interceptor() -> FieldInterceptor {
        let registry = MetadataRegistry::new().with(TypeDecl::new("Row").encrypted("a").encrypted("b"));
        FieldInterceptor::new(registry, Some(Arc::new(SelfKeyedEncryptor::new())))
    }

    fn sample_row(a: &str, b: &str) -> Row {
        let mut row = Row { key: Some(DocumentKey::generate().to_hex()), ..Row::default() };
        row.values.insert("a".to_string(), Some(a.to_string()));
        row.values.insert("b".to_string(), Some(b.to_string()));
        row
    }

    #[test]
    fn test_malformed_marked_value_is_integrity_error() {
        let interceptor = interceptor();
        let mut row = sample_row("plain", "garbage<ENC>");

        let err = interceptor.decrypt_fields(&mut row, &mut SessionContext::new()).unwrap_err();
        assert!(matches!(err, Error::Integrity));
        assert_eq!(row.values["b"].as_deref(), Some("garbage<ENC>"));
    }

    #[test]
    fn test_key_failure_leaves_entity_untouched() {
        let interceptor = interceptor();
        let mut row = sample_row("plain", "also plain");
        row.key = None;

        let err = interceptor.encrypt_fields(&mut row, &mut SessionContext::new()).unwrap_err();
        assert!(matches!(err, Error::KeyResolution(KeyResolutionError::DocumentUnreachable(_))));
        assert_eq!(row.values["a"].as_deref(), Some("plain"));
        assert_eq!(row.values["b"].as_deref(), Some("also plain"));
        assert_eq!(interceptor.encrypt_count(), 0);
    }

    #[test]
    fn test_partial_integrity_failure_writes_nothing() {
        let interceptor = interceptor();
        let mut cx = SessionContext::new();
        let mut row = sample_row("alpha", "beta");
        interceptor.encrypt_fields(&mut row, &mut cx).unwrap();

        row.values.insert("b".to_string(), Some("AAAA<ENC>".to_string()));
        let sealed_a = row.values["a"].clone();

        assert!(interceptor.decrypt_fields(&mut row, &mut cx).is_err());
        assert_eq!(row.values["a"], sealed_a);
        assert_eq!(interceptor.decrypt_count(), 0);
    }

    #[test]
    fn test_restore_encryptor() {
        let mut interceptor = interceptor();
        interceptor.clear_encryptor();
        assert!(interceptor.encryptor().is_none());

        interceptor.restore_encryptor();
        assert_eq!(interceptor.encryptor().map(|e| e.strategy()), Some("self_keyed"));
    }

    #[test]
    fn test_reset_counters() {
        let interceptor = interceptor();
        let mut row = sample_row("alpha", "beta");
        interceptor.encrypt_fields(&mut row, &mut SessionContext::new()).unwrap();
        assert_eq!(interceptor.encrypt_count(), 2);

        interceptor.reset_counters();
        assert_eq!(interceptor.encrypt_count(), 0);
    }

    #[test]
    fn test_subscribed_events() {
        let events = FieldInterceptor::subscribed_events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], LifecycleEvent::PreUpdate);
        assert_eq!(events[4], LifecycleEvent::PostFlush);
    }
}
