//! Signing secret with secure memory handling.
//!
//! The secret is always injected: read from an environment value, a key file,
//! or generated for a single process lifetime. It is zeroized on drop.

use std::fmt;
use std::io::Write;
use std::path::Path;

use base64::Engine;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

/// Minimum accepted secret length in bytes (the SHA-256 output size).
pub const MIN_SECRET_LEN: usize = 32;

/// Length of freshly generated secrets.
const GENERATED_SECRET_LEN: usize = 32;

/// Upper bound on key files we are willing to read.
const MAX_KEY_FILE_LEN: usize = 1024;

/// A MAC key used to sign authorization plans.
pub struct SigningSecret {
    bytes: Zeroizing<Vec<u8>>,
}

impl SigningSecret {
    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SecretTooShort`] if fewer than [`MIN_SECRET_LEN`] bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(CryptoError::SecretTooShort {
                minimum: MIN_SECRET_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
        })
    }

    /// Decode a standard base64 secret (as stored in an environment variable).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidBase64Encoding`] on malformed input, or
    /// [`CryptoError::SecretTooShort`] if the decoded secret is too short.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let decoded = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|_| CryptoError::InvalidBase64Encoding)?,
        );
        Self::from_bytes(&decoded)
    }

    /// Decode a hex secret.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidHexEncoding`] on malformed input, or
    /// [`CryptoError::SecretTooShort`] if the decoded secret is too short.
    pub fn from_hex(encoded: &str) -> CryptoResult<Self> {
        let decoded = Zeroizing::new(
            hex::decode(encoded.trim()).map_err(|_| CryptoError::InvalidHexEncoding)?,
        );
        Self::from_bytes(&decoded)
    }

    /// Generate a new random secret from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new(vec![0u8; GENERATED_SECRET_LEN]);
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Encode as standard base64 (careful - sensitive!).
    ///
    /// Only intended for provisioning the secret into a credential store.
    #[must_use]
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(self.bytes.as_slice()))
    }

    /// Raw secret bytes.
    #[must_use]
    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }

    /// Load an existing secret from a file, or generate and save a new one.
    ///
    /// If the file does not exist, a new secret is generated and written with
    /// `O_CREAT | O_EXCL` and mode 0o600 on Unix. Symlinked key files are
    /// refused. Parent directories are created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] on I/O failures or symlink detection,
    /// or [`CryptoError::SecretTooShort`] if the file holds too few bytes.
    pub fn load_or_generate(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::IoError(e.to_string()))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(path)
            {
                Ok(mut file) => {
                    let secret = Self::generate();
                    file.write_all(secret.expose())
                        .map_err(|e| CryptoError::IoError(e.to_string()))?;
                    file.sync_all()
                        .map_err(|e| CryptoError::IoError(e.to_string()))?;
                    return Ok(secret);
                },
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {},
                Err(e) => return Err(CryptoError::IoError(e.to_string())),
            }
        }

        #[cfg(not(unix))]
        if !path.exists() {
            let secret = Self::generate();
            let mut file =
                std::fs::File::create(path).map_err(|e| CryptoError::IoError(e.to_string()))?;
            file.write_all(secret.expose())
                .map_err(|e| CryptoError::IoError(e.to_string()))?;
            return Ok(secret);
        }

        let meta =
            std::fs::symlink_metadata(path).map_err(|e| CryptoError::IoError(e.to_string()))?;
        if meta.file_type().is_symlink() {
            return Err(CryptoError::IoError(
                "refusing to read key file: path is a symlink".into(),
            ));
        }

        let mut bytes =
            Zeroizing::new(std::fs::read(path).map_err(|e| CryptoError::IoError(e.to_string()))?);
        if bytes.len() > MAX_KEY_FILE_LEN {
            bytes.zeroize();
            return Err(CryptoError::IoError(format!(
                "key file exceeds {MAX_KEY_FILE_LEN} bytes"
            )));
        }
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}
