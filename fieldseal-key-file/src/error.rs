//! Key file error types.

use fieldseal::error::KeyResolutionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing or configuring key files.
#[derive(Debug, Error)]
pub enum KeyFileError {
    /// A key file could not be read or written
    #[error("key file {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A key file does not hold a valid key
    #[error("invalid key in {path}: {reason}")]
    InvalidKey {
        /// Offending path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The configured key could not be loaded
    #[error("key resolution failed: {0}")]
    Resolution(#[from] KeyResolutionError),
}

impl KeyFileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
