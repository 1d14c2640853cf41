//! Serde configuration selecting the encryption strategy.

use crate::error::KeyFileError;
use crate::provider::FileKeyProvider;
use fieldseal::encryptor::{Encryptor, SelfKeyedEncryptor, UserKeyedEncryptor};
use fieldseal::key_provider::KeyProvider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which encryption strategy the interceptor runs with.
///
/// ```json
/// { "strategy": "user_keyed", "private_key_path": "/etc/app/private.key" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum EncryptorConfig {
    /// No encryptor; the interceptor leaves every value untouched
    #[default]
    Disabled,
    /// Each document stores its own key
    SelfKeyed,
    /// Document keys are wrapped per user and opened with a private key file
    UserKeyed {
        /// Location of the process's private key
        private_key_path: PathBuf,
    },
}

impl EncryptorConfig {
    /// Builds the configured encryptor.
    ///
    /// For the user-keyed strategy the private key is loaded once up front so
    /// a bad path fails at startup rather than on the first encrypted field.
    ///
    /// # Errors
    ///
    /// Returns `KeyFileError::Resolution` if the private key cannot be loaded.
    pub fn build(&self) -> Result<Option<Arc<dyn Encryptor>>, KeyFileError> {
        let encryptor: Arc<dyn Encryptor> = match self {
            Self::Disabled => {
                tracing::warn!("field encryption disabled");
                return Ok(None);
            }
            Self::SelfKeyed => Arc::new(SelfKeyedEncryptor::new()),
            Self::UserKeyed { private_key_path } => {
                let provider = FileKeyProvider::new(private_key_path);
                provider.private_key()?;
                Arc::new(UserKeyedEncryptor::new(provider))
            }
        };
        tracing::info!(strategy = encryptor.strategy(), "field encryption enabled");
        Ok(Some(encryptor))
    }
}
