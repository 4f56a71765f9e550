//! Keyed tamper-evidence for authorization plans.
//!
//! A [`PlanSigner`] computes `base64(HMAC-SHA256(secret, message))`. It holds
//! no mutable state, so one signer can be shared (`Arc<PlanSigner>`) across
//! any number of concurrent signing and verification calls.

use std::fmt;

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::secret::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// A base64-encoded HMAC-SHA256 tag.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanSignature(String);

impl PlanSignature {
    /// Wrap an encoded signature (e.g. one read back from storage).
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The base64 text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the raw tag bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidBase64Encoding`] if the text is not valid base64.
    pub fn decode(&self) -> CryptoResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.0)
            .map_err(|_| CryptoError::InvalidBase64Encoding)
    }
}

impl fmt::Debug for PlanSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "PlanSignature({prefix}…)")
    }
}

impl fmt::Display for PlanSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signs and verifies plan digests with an injected secret.
#[derive(Clone)]
pub struct PlanSigner {
    keyed: HmacSha256,
    key_id: [u8; 8],
}

impl PlanSigner {
    /// Create a signer for the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the MAC rejects the key.
    pub fn new(secret: &SigningSecret) -> CryptoResult<Self> {
        let keyed = HmacSha256::new_from_slice(secret.expose())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let fingerprint = Sha256::digest(secret.expose());
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&fingerprint[..8]);

        Ok(Self { keyed, key_id })
    }

    /// Short, non-reversible key fingerprint for logs.
    #[must_use]
    pub fn key_id_hex(&self) -> String {
        hex::encode(self.key_id)
    }

    /// Sign a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> PlanSignature {
        let mut mac = self.keyed.clone();
        mac.update(message);
        let tag = mac.finalize().into_bytes();
        PlanSignature(base64::engine::general_purpose::STANDARD.encode(tag))
    }

    /// Verify a signature over `message` in constant time.
    ///
    /// Malformed signatures verify as `false`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &PlanSignature) -> bool {
        let Ok(tag) = signature.decode() else {
            return false;
        };
        let mut mac = self.keyed.clone();
        mac.update(message);
        mac.verify_slice(&tag).is_ok()
    }
}

impl fmt::Debug for PlanSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanSigner")
            .field("key_id", &self.key_id_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(byte: u8) -> PlanSigner {
        PlanSigner::new(&SigningSecret::from_bytes(&[byte; 32]).unwrap()).unwrap()
    }

    #[test]
    fn test_sign_is_deterministic() {
        let s = signer(1);
        assert_eq!(s.sign(b"a|b|c"), s.sign(b"a|b|c"));
        assert_ne!(s.sign(b"a|b|c"), s.sign(b"a|b|d"));
    }

    #[test]
    fn test_known_vector() {
        let s = signer(0x0b);
        let sig = s.sign(b"Hi There");
        assert_eq!(sig.as_str(), "GYpgfrRL+8aZA6Dxzyu9xboKo/PZrjwcejsWlqC2jPc=");
        assert_eq!(sig.decode().unwrap().len(), 32);
        assert!(s.verify(b"Hi There", &sig));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let sig = signer(1).sign(b"message");
        assert!(!signer(2).verify(b"message", &sig));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let s = signer(1);
        assert!(!s.verify(b"message", &PlanSignature::from_encoded("not base64!!")));
        assert!(!s.verify(b"message", &PlanSignature::from_encoded("")));
    }

    #[test]
    fn test_signature_serde_is_plain_string() {
        let sig = signer(3).sign(b"x");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", sig.as_str()));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let debug = format!("{:?}", signer(9));
        assert!(debug.starts_with("PlanSigner"));
        assert!(debug.contains("key_id"));
    }
}
