//! Keystone Audit - the content-free audit vault.
//!
//! The vault records *that* authorization events happened, never *what* they
//! were about:
//!
//! - [`AuditVault`]: bounded ring of [`AuditVaultEvent`]s with monotonic
//!   sequence numbers, oldest-first eviction and a confirmed purge
//! - [`Lineage`]: enum/count/hash/day-only provenance with a deterministic
//!   SHA-256 hash
//! - [`VaultSummary`] and [`VaultExport`]: linear-scan aggregates and a
//!   bounded export that must pass a forbidden-content scan
//!
//! Persistence is left to the owner via [`AuditVault::snapshot`] and
//! [`AuditVault::restore`]. A failed write never invalidates the in-memory
//! vault.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod event;
mod export;
mod lineage;
mod summary;
mod vault;

pub use error::{AuditError, AuditResult};
pub use event::{AuditVaultEvent, VAULT_SCHEMA_VERSION, VaultEventKind};
pub use export::{FORBIDDEN_KEYS, VaultExport, scan_for_content};
pub use lineage::{ContextSlot, LINEAGE_SCHEMA_VERSION, Lineage, OutcomeType, PolicyDecision};
pub use summary::{ROLLING_WINDOW_DAYS, VaultSummary};
pub use vault::{
    AuditVault, DEFAULT_EXPORT_RECENT_LIMIT, DEFAULT_VAULT_CAPACITY, PurgeOutcome, VaultConfig,
    VaultSnapshot,
};
