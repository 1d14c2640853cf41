//! # `fieldseal`
//!
//! Transparent field-level encryption for persisted entities.
//!
//! Attributes marked as encrypted are sealed before the persistence layer
//! writes them and opened again after it loads them, so application code only
//! ever sees plaintext and storage only ever sees ciphertext.
//!
//! ## Features
//!
//! - Marker protocol (`<ENC>` suffix) making every pass idempotent
//! - Per-type attribute selection across declared ancestry, cached per type
//! - Recursive processing of embedded objects
//! - Self-keyed documents, or document keys wrapped per user with `crypto_box`
//! - Unit-of-work scoped key cache that never outlives its principal
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldseal::prelude::*;
//!
//! let registry = MetadataRegistry::new()
//!     .with(TypeDecl::new("Patient").encrypted("diagnosis"));
//! let interceptor = FieldInterceptor::new(registry, Some(Arc::new(SelfKeyedEncryptor::new())));
//! let mut cx = SessionContext::new();
//!
//! interceptor.encrypt_fields(&mut patient, &mut cx)?;   // diagnosis = "...<ENC>"
//! interceptor.decrypt_fields(&mut patient, &mut cx)?;   // diagnosis = "flu"
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cipher;
pub mod context;
pub mod encryptor;
pub mod entity;
pub mod error;
pub mod interceptor;
pub mod key_provider;
pub mod keys;
pub mod lifecycle;
pub mod marker;
pub mod metadata;
pub mod selector;

#[cfg(feature = "derive")]
pub use fieldseal_derive::Entity;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::context::{Principal, SessionContext};
    pub use crate::encryptor::{Encryptor, SelfKeyedEncryptor, UserKeyedEncryptor};
    pub use crate::entity::{Entity, KeyBearer};
    pub use crate::error::{Error, KeyResolutionError, MetadataError};
    pub use crate::interceptor::{Direction, FieldInterceptor};
    pub use crate::key_provider::{KeyProvider, StaticKeyProvider};
    pub use crate::keys::{DocumentId, DocumentKey};
    pub use crate::lifecycle::{LifecycleEvent, PreUpdateArgs, UnitOfWork};
    pub use crate::metadata::{Described, MetadataRegistry, MetadataSource, TypeDecl};

    #[cfg(feature = "derive")]
    pub use fieldseal_derive::Entity;
}
