//! Configuration struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, and every field carries a serde default so partial
//! tables deserialize.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default environment variable carrying the signing secret.
pub const DEFAULT_KEY_ENV: &str = "KEYSTONE_SIGNING_KEY";

/// Top-level Keystone configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Plan signing key sources.
    pub signing: SigningSection,
    /// Audit vault settings.
    pub vault: VaultSection,
    /// Approval policy knobs.
    pub approval: ApprovalSection,
    /// Persistence location.
    pub storage: StorageSection,
    /// Log output.
    pub logging: LoggingSection,
}

/// `[signing]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningSection {
    /// Name of the environment variable holding a base64 secret.
    pub key_env: String,
    /// Raw key file, created if missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    /// Fall back to a random process-lifetime key.
    pub allow_ephemeral: bool,
}

impl Default for SigningSection {
    fn default() -> Self {
        Self {
            key_env: DEFAULT_KEY_ENV.to_string(),
            key_file: None,
            allow_ephemeral: false,
        }
    }
}

/// `[vault]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    /// Whether events are recorded at all.
    pub enabled: bool,
    /// Maximum retained events.
    pub capacity: usize,
    /// Events included in an export.
    pub export_recent_limit: usize,
    /// Write the vault to disk after each change.
    pub persist: bool,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 500,
            export_recent_limit: 25,
            persist: true,
        }
    }
}

/// `[approval]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// Cooldown before a critical plan may execute.
    pub critical_cooldown_secs: u64,
    /// Distinct approvers a critical plan needs.
    pub critical_signers: u8,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            critical_cooldown_secs: 30,
            critical_signers: 1,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Data directory. `None` means the platform default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level.
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra `target=level` directives.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            directives: Vec::new(),
        }
    }
}
