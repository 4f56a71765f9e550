//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on retained vault events.
pub const MAX_VAULT_CAPACITY: usize = 100_000;

/// Upper bound on the critical cooldown (one day).
pub const MAX_COOLDOWN_SECS: u64 = 86_400;

/// Upper bound on distinct critical signers.
pub const MAX_CRITICAL_SIGNERS: u8 = 16;

const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const KNOWN_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_signing(config)?;
    validate_vault(config)?;
    validate_approval(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_signing(config: &Config) -> ConfigResult<()> {
    let key_env = config.signing.key_env.trim();
    if key_env.is_empty() {
        return Err(invalid("signing.key_env", "must name an environment variable"));
    }
    if key_env.contains('=') || key_env.contains(char::is_whitespace) {
        return Err(invalid(
            "signing.key_env",
            format!("'{key_env}' is not a valid environment variable name"),
        ));
    }
    Ok(())
}

fn validate_vault(config: &Config) -> ConfigResult<()> {
    let v = &config.vault;
    if !(1..=MAX_VAULT_CAPACITY).contains(&v.capacity) {
        return Err(invalid(
            "vault.capacity",
            format!(
                "{} is out of range; must be between 1 and {MAX_VAULT_CAPACITY}",
                v.capacity
            ),
        ));
    }
    if !(1..=v.capacity).contains(&v.export_recent_limit) {
        return Err(invalid(
            "vault.export_recent_limit",
            format!(
                "{} is out of range; must be between 1 and the capacity ({})",
                v.export_recent_limit, v.capacity
            ),
        ));
    }
    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    let a = &config.approval;
    if a.critical_cooldown_secs > MAX_COOLDOWN_SECS {
        return Err(invalid(
            "approval.critical_cooldown_secs",
            format!(
                "{} exceeds the {MAX_COOLDOWN_SECS}s limit",
                a.critical_cooldown_secs
            ),
        ));
    }
    if !(1..=MAX_CRITICAL_SIGNERS).contains(&a.critical_signers) {
        return Err(invalid(
            "approval.critical_signers",
            format!("must be between 1 and {MAX_CRITICAL_SIGNERS}"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !KNOWN_LEVELS.contains(&l.level.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: {}",
                l.level,
                KNOWN_LEVELS.join(", ")
            ),
        ));
    }
    if !KNOWN_FORMATS.contains(&l.format.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                KNOWN_FORMATS.join(", ")
            ),
        ));
    }
    if let Some(bad) = l.directives.iter().find(|d| !d.contains('=')) {
        return Err(invalid(
            "logging.directives",
            format!("'{bad}' is not a target=level directive"),
        ));
    }
    Ok(())
}
