mod common;

use common::{registry, Document, FakeUnitOfWork, Memo};
use crypto_box::{aead::OsRng, SecretKey};
use fieldseal::keys::wrap_document_key;
use fieldseal::marker::is_marked;
use fieldseal::prelude::*;
use std::sync::Arc;

struct Setup {
    interceptor: FieldInterceptor,
    user: SecretKey,
    document: Document,
}

fn setup() -> Setup {
    let user = SecretKey::generate(&mut OsRng);
    let process = SecretKey::generate(&mut OsRng);
    let wrapped = wrap_document_key(&DocumentKey::generate(), &user, &process.public_key()).unwrap();

    let encryptor = UserKeyedEncryptor::new(StaticKeyProvider::new(process));
    Setup {
        interceptor: FieldInterceptor::new(registry(), Some(Arc::new(encryptor))),
        user,
        document: Document { id: "doc-42".to_string(), key: Some(wrapped) },
    }
}

fn principal(id: &str, key: &SecretKey) -> Principal {
    Principal::new(id).with_public_key(hex::encode(key.public_key().as_bytes()))
}

#[test]
fn test_flush_cycle_for_principal() {
    let Setup { interceptor, user, document } = setup();
    let mut cx = SessionContext::for_principal(principal("alice", &user));
    let mut uow = FakeUnitOfWork::default();
    let memo = uow.track(Memo::new(Some("quarterly numbers"), document));
    uow.updates.push(memo);

    interceptor.on_flush(&mut uow, &mut cx).unwrap();
    assert!(is_marked(&uow.value(memo, "secret").unwrap()));
    assert!(cx.has_key(&DocumentId::from("doc-42")));

    interceptor.post_flush(&mut uow, &mut cx).unwrap();
    assert_eq!(uow.value(memo, "secret").as_deref(), Some("quarterly numbers"));
}

#[test]
fn test_other_principal_cannot_open() {
    let Setup { interceptor, user, document } = setup();
    let mut cx = SessionContext::for_principal(principal("alice", &user));
    let mut memo = Memo::new(Some("for alice"), document);
    interceptor.encrypt_fields(&mut memo, &mut cx).unwrap();
    let sealed = memo.secret.clone();

    let mallory = SecretKey::generate(&mut OsRng);
    cx.set_principal(Some(principal("mallory", &mallory)));
    assert_eq!(cx.cached_keys(), 0);

    let err = interceptor.decrypt_fields(&mut memo, &mut cx).unwrap_err();
    assert!(matches!(err, Error::KeyResolution(KeyResolutionError::UnwrapFailed(_))));
    assert_eq!(memo.secret, sealed);
}

#[test]
fn test_no_principal() {
    let Setup { interceptor, document, .. } = setup();
    let mut memo = Memo::new(Some("hello"), document);

    let err = interceptor.encrypt_fields(&mut memo, &mut SessionContext::new()).unwrap_err();
    assert!(matches!(err, Error::KeyResolution(KeyResolutionError::PrincipalMissing)));
}

#[test]
fn test_fresh_context_resolves_again() {
    let Setup { interceptor, user, document } = setup();
    let mut memo = Memo::new(Some("hello"), document);

    let mut first = SessionContext::for_principal(principal("alice", &user));
    interceptor.encrypt_fields(&mut memo, &mut first).unwrap();
    drop(first);

    let mut second = SessionContext::for_principal(principal("alice", &user));
    assert_eq!(second.cached_keys(), 0);
    interceptor.decrypt_fields(&mut memo, &mut second).unwrap();
    assert_eq!(memo.secret.as_deref(), Some("hello"));
}
