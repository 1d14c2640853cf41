//! Authenticated encryption of individual field values.
//!
//! Field values are sealed with ChaCha20-Poly1305 under a key derived from the
//! owning document's key. The encoded form is
//!
//! ```text
//! base64( [version:1][nonce:12][ciphertext || tag] )
//! ```
//!
//! The version byte is also bound as associated data.

use crate::error::Error;
use crate::keys::{DocumentId, DocumentKey};
use crate::marker::Ciphertext;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce,
};

/// Current field ciphertext format.
pub const FORMAT_VERSION: u8 = 1;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
const NONCE_SIZE: usize = 12;

/// Authentication tag size.
const TAG_SIZE: usize = 16;

/// Seals a plaintext field value for `document`.
///
/// # Errors
///
/// Returns `Error::KeyDerivation` if the field key cannot be derived, or
/// `Error::EncryptionFailed` if the AEAD rejects the input.
pub fn seal(key: &DocumentKey, document: &DocumentId, plaintext: &str) -> Result<Ciphertext, Error> {
    let field_key = key.field_key(document)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&field_key[..])
        .map_err(|e| Error::EncryptionFailed(format!("invalid field key: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let sealed = cipher
        .encrypt(&nonce, Payload { msg: plaintext.as_bytes(), aad: &[FORMAT_VERSION] })
        .map_err(|e| Error::EncryptionFailed(format!("ChaCha20-Poly1305 encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(1 + NONCE_SIZE + sealed.len());
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);

    Ok(Ciphertext::new(STANDARD.encode(out)))
}

/// Opens a field ciphertext sealed for `document`.
///
/// # Errors
///
/// Returns `Error::Integrity` if the ciphertext is malformed, was sealed
/// under another key or document, or was tampered with.
pub fn open(key: &DocumentKey, document: &DocumentId, ciphertext: &Ciphertext) -> Result<String, Error> {
    let bytes = STANDARD.decode(ciphertext.as_str()).map_err(|_| Error::Integrity)?;
    if bytes.len() < 1 + NONCE_SIZE + TAG_SIZE || bytes[0] != FORMAT_VERSION {
        return Err(Error::Integrity);
    }

    let nonce = Nonce::from_slice(&bytes[1..=NONCE_SIZE]);
    let field_key = key.field_key(document)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&field_key[..]).map_err(|_| Error::Integrity)?;

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: &bytes[1 + NONCE_SIZE..], aad: &[FORMAT_VERSION] })
        .map_err(|_| Error::Integrity)?;

    String::from_utf8(plaintext).map_err(|_| Error::Integrity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc() -> DocumentId {
        DocumentId::new("doc-1")
    }

    #[test]
    fn test_seal_open_round_trip() {
        let key = DocumentKey::generate();
        let ciphertext = seal(&key, &doc(), "hello").expect("seal failed");
        let plaintext = open(&key, &doc(), &ciphertext).expect("open failed");
        assert_eq!(plaintext, "hello");
    }

    #[test]
    fn test_seal_is_randomized() {
        let key = DocumentKey::generate();
        let c1 = seal(&key, &doc(), "hello").unwrap();
        let c2 = seal(&key, &doc(), "hello").unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_wrong_key_fails_integrity() {
        let k1 = DocumentKey::generate();
        let k2 = DocumentKey::generate();
        let ciphertext = seal(&k1, &doc(), "hello").unwrap();
        assert!(matches!(open(&k2, &doc(), &ciphertext), Err(Error::Integrity)));
    }

    #[test]
    fn test_wrong_document_fails_integrity() {
        let key = DocumentKey::generate();
        let ciphertext = seal(&key, &DocumentId::new("a"), "hello").unwrap();
        assert!(matches!(open(&key, &DocumentId::new("b"), &ciphertext), Err(Error::Integrity)));
    }

    #[test]
    fn test_tampered_ciphertext_fails_integrity() {
        let key = DocumentKey::generate();
        let ciphertext = seal(&key, &doc(), "hello").unwrap();

        let mut raw = STANDARD.decode(ciphertext.as_str()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = Ciphertext::new(STANDARD.encode(raw));

        assert!(matches!(open(&key, &doc(), &tampered), Err(Error::Integrity)));
    }

    #[test]
    fn test_malformed_ciphertext_fails_integrity() {
        let key = DocumentKey::generate();
        for junk in ["", "not base64!", "AAAA"] {
            let result = open(&key, &doc(), &Ciphertext::new(junk.to_string()));
            assert!(matches!(result, Err(Error::Integrity)), "{junk:?} should not open");
        }
    }

    #[test]
    fn test_unknown_version_fails_integrity() {
        let key = DocumentKey::generate();
        let ciphertext = seal(&key, &doc(), "hello").unwrap();

        let mut raw = STANDARD.decode(ciphertext.as_str()).unwrap();
        raw[0] = 9;
        let bumped = Ciphertext::new(STANDARD.encode(raw));

        assert!(matches!(open(&key, &doc(), &bumped), Err(Error::Integrity)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_open_inverts_seal(plaintext in ".{1,256}") {
            let key = DocumentKey::generate();
            let ciphertext = seal(&key, &doc(), &plaintext).unwrap();
            prop_assert_eq!(open(&key, &doc(), &ciphertext).unwrap(), plaintext);
        }
    }
}
