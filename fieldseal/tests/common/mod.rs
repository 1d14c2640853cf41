//! Hand-written entities and persistence fakes shared by the integration tests.

#![allow(dead_code)]

use fieldseal::entity::{Entity, KeyBearer};
use fieldseal::error::Error;
use fieldseal::keys::DocumentKey;
use fieldseal::lifecycle::{PreUpdateArgs, UnitOfWork};
use fieldseal::metadata::{MetadataRegistry, TypeDecl};
use std::collections::HashMap;

/// Registry describing every fixture type below.
pub fn registry() -> MetadataRegistry {
    MetadataRegistry::new()
        .with(TypeDecl::new("Document").plain("title"))
        .with(TypeDecl::new("Record").encrypted("notes").plain("created_by"))
        .with(TypeDecl::new("Invoice").extends("Record").encrypted("iban").embedded("billing"))
        .with(TypeDecl::new("Address").encrypted("street").plain("country"))
        .with(TypeDecl::new("Memo").encrypted("secret"))
}

/// A key-bearing document with a self-keyed stored key.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub key: Option<String>,
}

impl Document {
    pub fn self_keyed(id: &str) -> Self {
        Self { id: id.to_string(), key: Some(DocumentKey::generate().to_hex()) }
    }
}

impl Entity for Document {
    fn type_name(&self) -> &str {
        "Document"
    }

    fn key_bearer(&self) -> Option<KeyBearer> {
        Some(KeyBearer::new(self.id.as_str(), self.key.clone()))
    }

    fn get(&self, attribute: &str) -> Result<Option<String>, Error> {
        Err(Error::unknown_attribute("Document", attribute))
    }

    fn set(&mut self, attribute: &str, _value: Option<String>) -> Result<(), Error> {
        Err(Error::unknown_attribute("Document", attribute))
    }
}

/// Single-attribute entity owned by a document.
#[derive(Debug, Clone)]
pub struct Memo {
    pub secret: Option<String>,
    pub document: Option<Document>,
}

impl Memo {
    pub fn new(secret: Option<&str>, document: Document) -> Self {
        Self { secret: secret.map(str::to_string), document: Some(document) }
    }
}

impl Entity for Memo {
    fn type_name(&self) -> &str {
        "Memo"
    }

    fn key_bearer(&self) -> Option<KeyBearer> {
        self.document.as_ref().and_then(|d| d.key_bearer())
    }

    fn get(&self, attribute: &str) -> Result<Option<String>, Error> {
        match attribute {
            "secret" => Ok(self.secret.clone()),
            _ => Err(Error::unknown_attribute("Memo", attribute)),
        }
    }

    fn set(&mut self, attribute: &str, value: Option<String>) -> Result<(), Error> {
        match attribute {
            "secret" => {
                self.secret = value;
                Ok(())
            }
            _ => Err(Error::unknown_attribute("Memo", attribute)),
        }
    }
}

/// Embedded value object without a document of its own.
#[derive(Debug, Clone, Default)]
pub struct Address {
    pub street: Option<String>,
    pub country: String,
}

impl Entity for Address {
    fn type_name(&self) -> &str {
        "Address"
    }

    fn get(&self, attribute: &str) -> Result<Option<String>, Error> {
        match attribute {
            "street" => Ok(self.street.clone()),
            "country" => Ok(Some(self.country.clone())),
            _ => Err(Error::unknown_attribute("Address", attribute)),
        }
    }

    fn set(&mut self, attribute: &str, value: Option<String>) -> Result<(), Error> {
        match attribute {
            "street" => self.street = value,
            "country" => self.country = value.unwrap_or_default(),
            _ => return Err(Error::unknown_attribute("Address", attribute)),
        }
        Ok(())
    }
}

/// An invoice: `Invoice` extends `Record`, which declares `notes`.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub notes: Option<String>,
    pub created_by: String,
    pub iban: Option<String>,
    pub billing: Option<Address>,
    pub document: Document,
}

impl Invoice {
    pub fn new(document: Document) -> Self {
        Self {
            notes: Some("pay within 30 days".to_string()),
            created_by: "alice".to_string(),
            iban: Some("DE89370400440532013000".to_string()),
            billing: Some(Address { street: Some("Main St 1".to_string()), country: "DE".to_string() }),
            document,
        }
    }
}

impl Entity for Invoice {
    fn type_name(&self) -> &str {
        "Invoice"
    }

    fn key_bearer(&self) -> Option<KeyBearer> {
        self.document.key_bearer()
    }

    fn get(&self, attribute: &str) -> Result<Option<String>, Error> {
        match attribute {
            "notes" => Ok(self.notes.clone()),
            "created_by" => Ok(Some(self.created_by.clone())),
            "iban" => Ok(self.iban.clone()),
            _ => Err(Error::unknown_attribute("Invoice", attribute)),
        }
    }

    fn set(&mut self, attribute: &str, value: Option<String>) -> Result<(), Error> {
        match attribute {
            "notes" => self.notes = value,
            "created_by" => self.created_by = value.unwrap_or_default(),
            "iban" => self.iban = value,
            _ => return Err(Error::unknown_attribute("Invoice", attribute)),
        }
        Ok(())
    }

    fn embedded_mut(&mut self, attribute: &str) -> Result<Option<&mut dyn Entity>, Error> {
        match attribute {
            "billing" => Ok(self.billing.as_mut().map(|a| a as &mut dyn Entity)),
            _ => Err(Error::unknown_attribute("Invoice", attribute)),
        }
    }
}

/// Lazy-loading proxy around an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceProxy(pub Invoice);

impl Entity for InvoiceProxy {
    fn type_name(&self) -> &str {
        "InvoiceProxy"
    }

    fn proxied_type(&self) -> Option<&str> {
        Some("Invoice")
    }

    fn key_bearer(&self) -> Option<KeyBearer> {
        self.0.key_bearer()
    }

    fn get(&self, attribute: &str) -> Result<Option<String>, Error> {
        self.0.get(attribute)
    }

    fn set(&mut self, attribute: &str, value: Option<String>) -> Result<(), Error> {
        self.0.set(attribute, value)
    }

    fn embedded_mut(&mut self, attribute: &str) -> Result<Option<&mut dyn Entity>, Error> {
        self.0.embedded_mut(attribute)
    }
}

/// In-memory unit of work addressing entities by index.
#[derive(Default)]
pub struct FakeUnitOfWork {
    pub entities: Vec<Box<dyn Entity>>,
    pub updates: Vec<usize>,
    pub insertions: Vec<usize>,
    pub recomputed: Vec<usize>,
}

impl FakeUnitOfWork {
    pub fn track(&mut self, entity: impl Entity + 'static) -> usize {
        self.entities.push(Box::new(entity));
        self.entities.len() - 1
    }

    pub fn value(&self, handle: usize, attribute: &str) -> Option<String> {
        self.entities[handle].get(attribute).unwrap()
    }
}

impl UnitOfWork for FakeUnitOfWork {
    type Handle = usize;

    fn scheduled_entity_updates(&self) -> Vec<usize> {
        self.updates.clone()
    }

    fn scheduled_entity_insertions(&self) -> Vec<usize> {
        self.insertions.clone()
    }

    fn identity_map(&self) -> Vec<usize> {
        (0..self.entities.len()).collect()
    }

    fn entity_mut(&mut self, handle: &usize) -> Option<&mut dyn Entity> {
        self.entities.get_mut(*handle).map(|e| &mut **e as &mut dyn Entity)
    }

    fn recompute_single_entity_change_set(&mut self, handle: &usize) -> Result<(), Error> {
        self.recomputed.push(*handle);
        Ok(())
    }
}

/// Pre-update arguments over a memo with an explicit change set.
pub struct FakePreUpdate {
    pub entity: Memo,
    pub old: HashMap<String, Option<String>>,
    pub new: HashMap<String, Option<String>>,
}

impl FakePreUpdate {
    pub fn new(entity: Memo) -> Self {
        Self { entity, old: HashMap::new(), new: HashMap::new() }
    }

    pub fn change(mut self, attribute: &str, old: Option<&str>, new: Option<&str>) -> Self {
        self.old.insert(attribute.to_string(), old.map(str::to_string));
        self.new.insert(attribute.to_string(), new.map(str::to_string));
        self
    }
}

impl PreUpdateArgs for FakePreUpdate {
    fn entity(&self) -> &dyn Entity {
        &self.entity
    }

    fn has_changed_field(&self, attribute: &str) -> bool {
        self.new.contains_key(attribute)
    }

    fn old_value(&self, attribute: &str) -> Option<String> {
        self.old.get(attribute).cloned().flatten()
    }

    fn new_value(&self, attribute: &str) -> Option<String> {
        self.new.get(attribute).cloned().flatten()
    }

    fn set_new_value(&mut self, attribute: &str, value: Option<String>) {
        self.new.insert(attribute.to_string(), value);
    }
}
