//! Keystone Crypto - plan signing and content hashing.
//!
//! This crate provides:
//! - [`SigningSecret`]: the injected MAC key, zeroized on drop
//! - [`PlanSigner`]: HMAC-SHA256 over a plan's immutable fields, base64-encoded
//! - [`ContentHash`]: SHA-256 digests for lineage records and procedure hashes
//!
//! # Key Material
//!
//! There is no built-in key. A secret must be supplied from configuration
//! (environment, key file) or generated explicitly for an ephemeral session.
//!
//! # Example
//!
//! ```
//! use keystone_crypto::{PlanSigner, SigningSecret};
//!
//! let secret = SigningSecret::generate();
//! let signer = PlanSigner::new(&secret).unwrap();
//!
//! let signature = signer.sign(b"plan-id|send_message|90|irreversible|1700000000000");
//! assert!(signer.verify(b"plan-id|send_message|90|irreversible|1700000000000", &signature));
//! assert!(!signer.verify(b"plan-id|send_message|10|irreversible|1700000000000", &signature));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hash;
mod secret;
mod signer;

pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use secret::{MIN_SECRET_LEN, SigningSecret};
pub use signer::{PlanSignature, PlanSigner};
