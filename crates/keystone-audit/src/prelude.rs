//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Vault
pub use crate::{AuditVault, PurgeOutcome, VaultConfig, VaultSnapshot};

// Events & lineage
pub use crate::{AuditVaultEvent, ContextSlot, Lineage, OutcomeType, PolicyDecision, VaultEventKind};

// Reporting
pub use crate::{VaultExport, VaultSummary};
