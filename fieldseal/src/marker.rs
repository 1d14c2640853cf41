//! Marker protocol for telling sealed values apart from plaintext.
//!
//! A persisted encrypted attribute holds `ciphertext || "<ENC>"`. Anything
//! without the suffix is plaintext waiting to be sealed. Marking consumes a
//! [`Ciphertext`], and the only ways to obtain one are sealing a plaintext or
//! unmarking a marked value, so a value cannot be marked twice.

use std::fmt;

/// Suffix appended to every sealed attribute value.
pub const ENCRYPTION_MARKER: &str = "<ENC>";

/// Unmarked ciphertext, as produced by the cipher.
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext(String);

impl Ciphertext {
    pub(crate) fn new(encoded: String) -> Self {
        debug_assert!(!is_marked(&encoded));
        Self(encoded)
    }

    /// Returns the encoded ciphertext.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ciphertext, returning the encoded string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ciphertext").field(&format_args!("{} bytes", self.0.len())).finish()
    }
}

/// Returns `true` if the value carries the encryption marker.
#[must_use]
pub fn is_marked(value: &str) -> bool {
    value.ends_with(ENCRYPTION_MARKER)
}

/// Appends the marker to a ciphertext.
#[must_use]
pub fn mark(ciphertext: Ciphertext) -> String {
    let mut value = ciphertext.0;
    value.push_str(ENCRYPTION_MARKER);
    value
}

/// Strips the marker, returning `None` if the value is not marked.
#[must_use]
pub fn unmark(value: &str) -> Option<Ciphertext> {
    value.strip_suffix(ENCRYPTION_MARKER).map(|raw| Ciphertext(raw.to_string()))
}

/// State of an encrypted attribute's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldState {
    /// Null or empty: nothing to seal or open
    Empty,
    /// Plaintext pending encryption
    Plaintext(String),
    /// Sealed value with the marker stripped
    Sealed(Ciphertext),
}

impl FieldState {
    /// Classifies a raw attribute value.
    #[must_use]
    pub fn classify(value: Option<String>) -> Self {
        match value {
            None => Self::Empty,
            Some(v) if v.is_empty() => Self::Empty,
            Some(v) => match unmark(&v) {
                Some(ciphertext) => Self::Sealed(ciphertext),
                None => Self::Plaintext(v),
            },
        }
    }
}
