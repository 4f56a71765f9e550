//! Vault event types.

use serde::{Deserialize, Serialize};
use std::fmt;

use keystone_core::DayStamp;

use crate::lineage::Lineage;

/// Current vault event schema version.
pub const VAULT_SCHEMA_VERSION: u32 = 1;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEventKind {
    /// A plan was signed.
    PlanCreated,
    /// A draft or its effects were edited.
    PlanEdited,
    /// A plan or draft left the device.
    PlanExported,
    /// The gate checked a plan.
    AuthorizationVerified,
    /// The execution engine reported an outcome.
    ExecutionRecorded,
    /// The vault was purged (marker).
    VaultPurged,
}

impl VaultEventKind {
    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PlanCreated => "plan_created",
            Self::PlanEdited => "plan_edited",
            Self::PlanExported => "plan_exported",
            Self::AuthorizationVerified => "authorization_verified",
            Self::ExecutionRecorded => "execution_recorded",
            Self::VaultPurged => "vault_purged",
        }
    }
}

impl fmt::Display for VaultEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vault entry. Holds no free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditVaultEvent {
    /// Monotonic sequence number.
    pub sequence: u64,
    /// Day the event was recorded.
    pub created: DayStamp,
    /// Event kind.
    pub kind: VaultEventKind,
    /// Provenance, if any.
    pub lineage: Option<Lineage>,
    /// Number of events destroyed (purge markers only).
    pub purged_count: Option<u64>,
    /// Schema version.
    pub schema_version: u32,
}
