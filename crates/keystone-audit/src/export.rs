//! Bounded, validated vault exports.
//!
//! An export is the summary plus the most recent events. Before it is
//! returned it is serialized and walked: no key may name a content field and
//! every string must be one of the shapes the vault itself produces
//! (lowercase token, hex digest, UUID, ISO date).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use regex::Regex;

use keystone_core::DayStamp;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditVaultEvent;
use crate::summary::VaultSummary;

/// Keys that would indicate user content leaked into an export.
pub const FORBIDDEN_KEYS: &[&str] = &[
    "content",
    "text",
    "body",
    "message",
    "title",
    "note",
    "prompt",
    "description",
];

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("invalid regex"));
static HEX_DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{16,128}$").expect("invalid regex"));
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("invalid regex")
});
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("invalid regex"));

/// A snapshot safe to hand outside the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultExport {
    /// Export schema version.
    pub schema_version: u32,
    /// Day the export was produced.
    pub generated: DayStamp,
    /// Aggregate counts.
    pub summary: VaultSummary,
    /// Most recent events, oldest first.
    pub recent: Vec<AuditVaultEvent>,
}

impl VaultExport {
    /// Run the forbidden-content scan over this export.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::ForbiddenContent`] naming the first offending
    /// path, or [`AuditError::SerializationError`] if it cannot be encoded.
    pub fn validate(&self) -> AuditResult<()> {
        let value =
            serde_json::to_value(self).map_err(|e| AuditError::SerializationError(e.to_string()))?;
        scan_for_content(&value)
    }

    /// Pretty JSON for the operator.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SerializationError`] if encoding fails.
    pub fn to_json_pretty(&self) -> AuditResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AuditError::SerializationError(e.to_string()))
    }
}

/// Walk a JSON value and reject anything that looks like user content.
///
/// # Errors
///
/// Returns [`AuditError::ForbiddenContent`] naming the first offending path.
pub fn scan_for_content(value: &Value) -> AuditResult<()> {
    scan(value, "$")
}

fn scan(value: &Value, path: &str) -> AuditResult<()> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        Value::String(s) => {
            if is_allowed_string(s) {
                Ok(())
            } else {
                Err(forbidden(path, "string is not a token, digest, uuid or date"))
            }
        },
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| scan(item, &format!("{path}[{i}]"))),
        Value::Object(map) => map.iter().try_for_each(|(key, item)| {
            let child = format!("{path}.{key}");
            if FORBIDDEN_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                return Err(forbidden(&child, "forbidden key"));
            }
            if !TOKEN.is_match(key) {
                return Err(forbidden(&child, "key is not a lowercase token"));
            }
            scan(item, &child)
        }),
    }
}

fn is_allowed_string(s: &str) -> bool {
    TOKEN.is_match(s) || HEX_DIGEST.is_match(s) || UUID.is_match(s) || ISO_DATE.is_match(s)
}

fn forbidden(path: &str, reason: &str) -> AuditError {
    AuditError::ForbiddenContent {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_vault_shapes() {
        let value = json!({
            "kind": "plan_created",
            "created": "2026-10-19",
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "hash": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            "sequence": 42,
            "lineage": null,
            "nested": [{"tier": "critical"}]
        });
        assert!(scan_for_content(&value).is_ok());
    }

    #[test]
    fn test_rejects_forbidden_key() {
        let value = json!({"recent": [{"body": "ok"}]});
        let err = scan_for_content(&value).unwrap_err();
        assert!(matches!(
            err,
            AuditError::ForbiddenContent { ref path, .. } if path == "$.recent[0].body"
        ));
    }

    #[test]
    fn test_rejects_forbidden_key_any_case() {
        assert!(scan_for_content(&json!({"Title": 1})).is_err());
    }

    #[test]
    fn test_rejects_free_text_value() {
        let value = json!({"kind": "Dinner with Alex at 7"});
        assert!(matches!(
            scan_for_content(&value),
            Err(AuditError::ForbiddenContent { .. })
        ));
    }

    #[test]
    fn test_rejects_odd_keys() {
        assert!(scan_for_content(&json!({"Some Key": 1})).is_err());
    }
}
