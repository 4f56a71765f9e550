//! `KEYSTONE_*` environment overrides.
//!
//! Env vars are the highest-precedence layer: a set variable replaces
//! whatever the files said. Values are coerced to the field's TOML type and
//! a value that does not parse is an error rather than silently ignored.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Str,
    Int,
    Bool,
}

struct EnvMapping {
    var_name: &'static str,
    section: &'static str,
    field: &'static str,
    kind: FieldKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "KEYSTONE_LOG_LEVEL",
        section: "logging",
        field: "level",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "KEYSTONE_DATA_DIR",
        section: "storage",
        field: "data_dir",
        kind: FieldKind::Str,
    },
    EnvMapping {
        var_name: "KEYSTONE_VAULT_CAPACITY",
        section: "vault",
        field: "capacity",
        kind: FieldKind::Int,
    },
    EnvMapping {
        var_name: "KEYSTONE_VAULT_ENABLED",
        section: "vault",
        field: "enabled",
        kind: FieldKind::Bool,
    },
];

/// Names of all recognised override variables.
pub fn override_vars() -> impl Iterator<Item = &'static str> {
    ENV_MAPPINGS.iter().map(|m| m.var_name)
}

/// Collect the current process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Apply every set override to the merged tree.
///
/// Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a value cannot be coerced.
pub fn apply_env_overrides<S: BuildHasher>(
    merged: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let value = coerce(mapping, raw)?;

        let Some(root) = merged.as_table_mut() else {
            continue;
        };
        let section = root
            .entry(mapping.section)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
        if let Some(table) = section.as_table_mut() {
            table.insert(mapping.field.to_owned(), value);
            debug!(
                var = mapping.var_name,
                field = %format!("{}.{}", mapping.section, mapping.field),
                "applied env override"
            );
            count = count.saturating_add(1);
        }
    }

    Ok(count)
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    let trimmed = raw.trim();
    match mapping.kind {
        FieldKind::Str => Ok(toml::Value::String(trimmed.to_owned())),
        FieldKind::Int => trimmed
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected an integer: {e}"),
            }),
        FieldKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Ok(toml::Value::Boolean(false)),
            _ => Err(ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("expected a boolean, got '{trimmed}'"),
            }),
        },
    }
}
