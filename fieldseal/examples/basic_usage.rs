//! Basic usage example for `fieldseal`.

use fieldseal::keys::DocumentKey;
use fieldseal::metadata::MetadataRegistry;
use fieldseal::prelude::{FieldInterceptor, SelfKeyedEncryptor, SessionContext};
use fieldseal_derive::Entity;
use std::sync::Arc;

#[derive(Debug, Entity)]
#[entity(key_bearer)]
struct Clinic {
    #[entity(id)]
    id: String,
    #[entity(key)]
    key: Option<String>,
}

#[derive(Debug, Entity)]
struct Patient {
    name: String,
    #[entity(encrypted)]
    diagnosis: Option<String>,
    #[entity(document)]
    clinic: Clinic,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("fieldseal Basic Usage Example");
    println!("=============================\n");

    let mut registry = MetadataRegistry::new();
    registry.register::<Patient>();

    let interceptor = FieldInterceptor::new(registry, Some(Arc::new(SelfKeyedEncryptor::new())));
    let mut cx = SessionContext::new();

    let mut patient = Patient {
        name: "Jane Doe".to_string(),
        diagnosis: Some("seasonal flu".to_string()),
        clinic: Clinic { id: "clinic-1".to_string(), key: Some(DocumentKey::generate().to_hex()) },
    };
    println!("Plaintext: {:?}", patient.diagnosis);

    interceptor.encrypt_fields(&mut patient, &mut cx)?;
    println!("Stored:    {:?}", patient.diagnosis);

    interceptor.decrypt_fields(&mut patient, &mut cx)?;
    println!("Loaded:    {:?}\n", patient.diagnosis);

    assert_eq!(patient.diagnosis.as_deref(), Some("seasonal flu"));
    println!("{} value(s) sealed, {} opened for {}", interceptor.encrypt_count(), interceptor.decrypt_count(), patient.name);
    Ok(())
}
