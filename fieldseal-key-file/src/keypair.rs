//! Process key pair generation and the on-disk key file format.
//!
//! Keys are stored as lowercase hex, 32 bytes each. Private keys are
//! written with owner-only permissions on Unix.

use crate::error::KeyFileError;
use crypto_box::{PublicKey, SecretKey};
use fieldseal::keys::parse_public_key;
use rand::rngs::OsRng;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// File name of the public half.
pub const PUBLIC_KEY_FILE: &str = "public.key";

/// File name of the private half.
pub const PRIVATE_KEY_FILE: &str = "private.key";

/// An X25519 key pair for the user-keyed strategy.
pub struct KeyPair {
    secret: SecretKey,
}

/// Where [`KeyPair::write_to`] put the two halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    /// Path of the public key file
    pub public: PathBuf,
    /// Path of the private key file
    pub private: PathBuf,
}

impl KeyPair {
    /// Generates a fresh key pair from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        Self { secret: SecretKey::generate(&mut OsRng) }
    }

    /// The secret half.
    #[must_use]
    pub const fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// The public half.
    #[must_use]
    pub fn public(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// Hex encoding of the public half.
    #[must_use]
    pub fn public_hex(&self) -> String {
        hex::encode(self.public().as_bytes())
    }

    /// Writes the public key to `dir`.
    ///
    /// # Errors
    ///
    /// Returns `KeyFileError::Io` if the directory or file cannot be written.
    pub fn write_public(&self, dir: &Path) -> Result<PathBuf, KeyFileError> {
        let path = dir.join(PUBLIC_KEY_FILE);
        let mut contents = self.public_hex();
        contents.push('\n');
        write_key_file(&path, contents.as_bytes(), false)?;
        Ok(path)
    }

    /// Writes the private key to `dir`, readable by the owner only.
    ///
    /// # Errors
    ///
    /// Returns `KeyFileError::Io` if the directory or file cannot be written.
    pub fn write_private(&self, dir: &Path) -> Result<PathBuf, KeyFileError> {
        let path = dir.join(PRIVATE_KEY_FILE);
        let mut contents = Zeroizing::new(hex::encode(self.secret.to_bytes()));
        contents.push('\n');
        write_key_file(&path, contents.as_bytes(), true)?;
        Ok(path)
    }

    /// Writes both halves to `dir`, creating it if needed.
    ///
    /// Existing key files are overwritten.
    ///
    /// # Errors
    ///
    /// Returns `KeyFileError::Io` if the directory or a file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<KeyPairPaths, KeyFileError> {
        std::fs::create_dir_all(dir).map_err(|e| KeyFileError::io(dir, e))?;
        let public = self.write_public(dir)?;
        let private = self.write_private(dir)?;
        Ok(KeyPairPaths { public, private })
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_hex())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Reads a hex-encoded public key file.
///
/// # Errors
///
/// Returns `KeyFileError::Io` if the file cannot be read, or
/// `KeyFileError::InvalidKey` if it does not hold a 32-byte key.
pub fn read_public_key(path: &Path) -> Result<PublicKey, KeyFileError> {
    let encoded = std::fs::read_to_string(path).map_err(|e| KeyFileError::io(path, e))?;
    parse_public_key(&encoded).map_err(|reason| KeyFileError::InvalidKey { path: path.to_path_buf(), reason })
}

fn write_key_file(path: &Path, contents: &[u8], private: bool) -> Result<(), KeyFileError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(if private { 0o600 } else { 0o644 });
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(|e| KeyFileError::io(path, e))?;
    file.write_all(contents).map_err(|e| KeyFileError::io(path, e))?;
    file.sync_all().map_err(|e| KeyFileError::io(path, e))?;
    tracing::debug!(path = %path.display(), private, "wrote key file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let pair = KeyPair::generate();
        let paths = pair.write_to(dir.path()).unwrap();

        assert_eq!(paths.public, dir.path().join(PUBLIC_KEY_FILE));
        assert_eq!(read_public_key(&paths.public).unwrap(), pair.public());

        let private = std::fs::read_to_string(&paths.private).unwrap();
        assert_eq!(private.trim().len(), 64);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        KeyPair::generate().write_to(&nested).unwrap();
        assert!(nested.join(PRIVATE_KEY_FILE).exists());
    }

    #[test]
    fn test_overwrites_existing_pair() {
        let dir = TempDir::new().unwrap();
        KeyPair::generate().write_to(dir.path()).unwrap();
        let second = KeyPair::generate();
        let paths = second.write_to(dir.path()).unwrap();
        assert_eq!(read_public_key(&paths.public).unwrap(), second.public());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let paths = KeyPair::generate().write_to(dir.path()).unwrap();
        let mode = std::fs::metadata(&paths.private).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_invalid_public_key_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PUBLIC_KEY_FILE);
        std::fs::write(&path, "zz").unwrap();
        assert!(matches!(read_public_key(&path), Err(KeyFileError::InvalidKey { .. })));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = KeyPair::generate();
        let debug = format!("{pair:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&hex::encode(pair.secret().to_bytes())));
    }
}
