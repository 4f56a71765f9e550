//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_crypto::prelude::*;` to import all essential types.

// Errors
pub use crate::{CryptoError, CryptoResult};

// Signing
pub use crate::{PlanSignature, PlanSigner, SigningSecret};

// Hashing
pub use crate::ContentHash;
