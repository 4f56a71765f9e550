//! Signing key resolution.
//!
//! Order: the configured environment variable (base64), then the key file
//! (created on first use), then a random process-lifetime key if and only if
//! `signing.allow_ephemeral` is set. There is no built-in fallback key.

use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::path::PathBuf;

use tracing::{info, warn};

use keystone_config::SigningSection;
use keystone_crypto::SigningSecret;

use crate::error::{KernelError, KernelResult};

/// Where the signing key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Base64 secret from this environment variable.
    Env(String),
    /// Raw key file.
    File(PathBuf),
    /// Random key that dies with the process.
    Ephemeral,
    /// Supplied directly by the embedding code.
    Injected,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(var) => write!(f, "env:{var}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Ephemeral => write!(f, "ephemeral"),
            Self::Injected => write!(f, "injected"),
        }
    }
}

/// Resolve the signing secret described by `section`.
///
/// # Errors
///
/// Returns [`KernelError::Crypto`] if a configured key is malformed or the
/// key file cannot be used, or [`KernelError::NoSigningKey`] if nothing is
/// configured and ephemeral keys are not allowed.
pub fn resolve_signing_secret<S: BuildHasher>(
    section: &SigningSection,
    env_vars: &HashMap<String, String, S>,
) -> KernelResult<(SigningSecret, KeySource)> {
    if let Some(encoded) = env_vars
        .get(&section.key_env)
        .filter(|v| !v.trim().is_empty())
    {
        let secret = SigningSecret::from_base64(encoded)?;
        info!(source = %section.key_env, "signing key loaded from environment");
        return Ok((secret, KeySource::Env(section.key_env.clone())));
    }

    if let Some(path) = &section.key_file {
        let secret = SigningSecret::load_or_generate(path)?;
        info!(path = %path.display(), "signing key loaded from file");
        return Ok((secret, KeySource::File(path.clone())));
    }

    if section.allow_ephemeral {
        warn!(
            "no signing key configured, using an ephemeral key; signed plans will not verify after restart"
        );
        return Ok((SigningSecret::generate(), KeySource::Ephemeral));
    }

    Err(KernelError::NoSigningKey {
        key_env: section.key_env.clone(),
    })
}
