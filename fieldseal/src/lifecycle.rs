//! Persistence lifecycle surfaces the interceptor is driven by.
//!
//! The persistence framework owns dispatch order. Within one flush cycle it
//! fires [`LifecycleEvent::PreUpdate`] per changed entity, then
//! [`LifecycleEvent::OnFlush`] once, then `PostUpdate`/`PostLoad` per entity,
//! then [`LifecycleEvent::PostFlush`] once after commit.

use crate::entity::Entity;
use crate::error::Error;
use std::fmt;

/// Lifecycle events the interceptor subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Before a changed entity is written
    PreUpdate,
    /// Once per flush, with the full change set
    OnFlush,
    /// After an entity was updated
    PostUpdate,
    /// After an entity was loaded
    PostLoad,
    /// Once per flush, after commit
    PostFlush,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreUpdate => "preUpdate",
            Self::OnFlush => "onFlush",
            Self::PostUpdate => "postUpdate",
            Self::PostLoad => "postLoad",
            Self::PostFlush => "postFlush",
        };
        f.write_str(name)
    }
}

/// The pending unit of work as seen from a flush callback.
///
/// Entities are addressed through handles so the interceptor can borrow one
/// entity at a time and still ask the unit of work to recompute its change set.
pub trait UnitOfWork {
    /// Handle identifying a tracked entity.
    type Handle: Clone + fmt::Debug;

    /// Entities scheduled for update.
    fn scheduled_entity_updates(&self) -> Vec<Self::Handle>;

    /// Entities scheduled for insertion.
    fn scheduled_entity_insertions(&self) -> Vec<Self::Handle>;

    /// Every entity tracked by the identity map.
    fn identity_map(&self) -> Vec<Self::Handle>;

    /// Borrows a tracked entity.
    fn entity_mut(&mut self, handle: &Self::Handle) -> Option<&mut dyn Entity>;

    /// Recomputes the change set of one entity after the interceptor touched it.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the interceptor propagates it.
    fn recompute_single_entity_change_set(&mut self, handle: &Self::Handle) -> Result<(), Error>;
}

/// Arguments of a pre-update callback.
pub trait PreUpdateArgs {
    /// The entity being updated.
    fn entity(&self) -> &dyn Entity;

    /// Whether the attribute is part of the change set.
    fn has_changed_field(&self, attribute: &str) -> bool;

    /// Value before the change.
    fn old_value(&self, attribute: &str) -> Option<String>;

    /// Value about to be written.
    fn new_value(&self, attribute: &str) -> Option<String>;

    /// Replaces the value about to be written.
    fn set_new_value(&mut self, attribute: &str, value: Option<String>);
}
