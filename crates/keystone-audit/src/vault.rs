//! The audit vault: a bounded, monotonically sequenced event ledger.
//!
//! The vault is owned by one coordinator and mutated through `&mut self`.
//! It keeps at most `capacity` events and evicts the oldest first. Sequence
//! numbers are never reused, including across purges and restarts.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use keystone_core::DayStamp;

use crate::error::{AuditError, AuditResult};
use crate::event::{AuditVaultEvent, VAULT_SCHEMA_VERSION, VaultEventKind};
use crate::export::VaultExport;
use crate::lineage::Lineage;
use crate::summary::VaultSummary;

/// Default number of retained events.
pub const DEFAULT_VAULT_CAPACITY: usize = 500;

/// Default number of events included in an export.
pub const DEFAULT_EXPORT_RECENT_LIMIT: usize = 25;

/// Vault settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Whether the vault records anything.
    pub enabled: bool,
    /// Maximum retained events (at least 1).
    pub capacity: usize,
    /// Events included in an export.
    pub export_recent_limit: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_VAULT_CAPACITY,
            export_recent_limit: DEFAULT_EXPORT_RECENT_LIMIT,
        }
    }
}

/// Result of [`AuditVault::purge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurgeOutcome {
    /// The vault is switched off.
    NotEnabled,
    /// Nothing was changed; ask the user first.
    RequiresConfirmation,
    /// This many events were destroyed; a single marker remains.
    Success(usize),
}

/// Persistable vault state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Sequence number the next event will get.
    pub next_sequence: u64,
    /// Retained events, oldest first.
    pub events: Vec<AuditVaultEvent>,
}

/// Bounded, content-free event ledger.
#[derive(Debug, Clone)]
pub struct AuditVault {
    config: VaultConfig,
    events: VecDeque<AuditVaultEvent>,
    next_sequence: u64,
}

impl AuditVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new(config: VaultConfig) -> Self {
        let config = VaultConfig {
            capacity: config.capacity.max(1),
            ..config
        };
        Self {
            config,
            events: VecDeque::with_capacity(config.capacity.min(DEFAULT_VAULT_CAPACITY)),
            next_sequence: 1,
        }
    }

    /// Rebuild a vault from a snapshot.
    ///
    /// Events beyond capacity are evicted oldest first, and the sequence
    /// resumes above the highest retained number.
    #[must_use]
    pub fn restore(config: VaultConfig, snapshot: VaultSnapshot) -> Self {
        let mut vault = Self::new(config);
        let mut events = snapshot.events;
        events.sort_by_key(|e| e.sequence);
        let highest = events.last().map_or(0, |e| e.sequence);
        vault.events = events.into();
        vault.evict();
        vault.next_sequence = snapshot.next_sequence.max(highest.saturating_add(1)).max(1);
        debug!(
            events = vault.events.len(),
            next_sequence = vault.next_sequence,
            "audit vault restored"
        );
        vault
    }

    /// Export the state for persistence.
    #[must_use]
    pub fn snapshot(&self) -> VaultSnapshot {
        VaultSnapshot {
            next_sequence: self.next_sequence,
            events: self.events.iter().cloned().collect(),
        }
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Whether the vault records anything.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &AuditVaultEvent> {
        self.events.iter()
    }

    /// Append an event dated today. Returns its sequence number, or `None`
    /// when the vault is disabled.
    pub fn append(&mut self, kind: VaultEventKind, lineage: Option<Lineage>) -> Option<u64> {
        self.append_on(DayStamp::today(), kind, lineage)
    }

    /// Append an event dated `day`.
    pub fn append_on(
        &mut self,
        day: DayStamp,
        kind: VaultEventKind,
        lineage: Option<Lineage>,
    ) -> Option<u64> {
        if !self.config.enabled {
            return None;
        }
        Some(self.push(day, kind, lineage, None))
    }

    fn push(
        &mut self,
        day: DayStamp,
        kind: VaultEventKind,
        lineage: Option<Lineage>,
        purged_count: Option<u64>,
    ) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.events.push_back(AuditVaultEvent {
            sequence,
            created: day,
            kind,
            lineage,
            purged_count,
            schema_version: VAULT_SCHEMA_VERSION,
        });
        self.evict();
        debug!(sequence, kind = %kind, "audit event appended");
        sequence
    }

    fn evict(&mut self) {
        while self.events.len() > self.config.capacity {
            if let Some(evicted) = self.events.pop_front() {
                debug!(sequence = evicted.sequence, "audit event evicted");
            }
        }
    }

    /// Summarize as of today.
    #[must_use]
    pub fn summarize(&self) -> VaultSummary {
        self.summarize_on(DayStamp::today())
    }

    /// Summarize as of `today`.
    #[must_use]
    pub fn summarize_on(&self, today: DayStamp) -> VaultSummary {
        VaultSummary::from_events(&self.events, today)
    }

    /// Clear the vault, leaving one purge marker.
    pub fn purge(&mut self, confirmed: bool) -> PurgeOutcome {
        self.purge_on(DayStamp::today(), confirmed)
    }

    /// [`AuditVault::purge`] with an explicit marker date.
    pub fn purge_on(&mut self, day: DayStamp, confirmed: bool) -> PurgeOutcome {
        if !self.config.enabled {
            return PurgeOutcome::NotEnabled;
        }
        if !confirmed {
            return PurgeOutcome::RequiresConfirmation;
        }
        let destroyed = self.events.len();
        self.events.clear();
        self.push(
            day,
            VaultEventKind::VaultPurged,
            None,
            Some(u64::try_from(destroyed).unwrap_or(u64::MAX)),
        );
        info!(destroyed, "audit vault purged");
        PurgeOutcome::Success(destroyed)
    }

    /// Build and validate an export dated today.
    ///
    /// # Errors
    ///
    /// See [`AuditVault::export_summary_on`].
    pub fn export_summary(&self) -> AuditResult<VaultExport> {
        self.export_summary_on(DayStamp::today())
    }

    /// Build and validate an export dated `today`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NotEnabled`] if the vault is off, or
    /// [`AuditError::ForbiddenContent`] if the scan fails.
    pub fn export_summary_on(&self, today: DayStamp) -> AuditResult<VaultExport> {
        if !self.config.enabled {
            return Err(AuditError::NotEnabled);
        }
        let skip = self
            .events
            .len()
            .saturating_sub(self.config.export_recent_limit);
        let export = VaultExport {
            schema_version: VAULT_SCHEMA_VERSION,
            generated: today,
            summary: self.summarize_on(today),
            recent: self.events.iter().skip(skip).cloned().collect(),
        };
        export.validate()?;
        Ok(export)
    }
}

impl Default for AuditVault {
    fn default() -> Self {
        Self::new(VaultConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::{ContextSlot, OutcomeType, PolicyDecision};
    use keystone_core::RiskTier;

    fn day() -> DayStamp {
        DayStamp::from_ymd(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_sequence_monotonic() {
        let mut vault = AuditVault::default();
        let a = vault.append_on(day(), VaultEventKind::PlanCreated, None).unwrap();
        let b = vault.append_on(day(), VaultEventKind::PlanEdited, None).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_capacity_eviction() {
        let mut vault = AuditVault::default();
        for _ in 0..501 {
            vault.append_on(day(), VaultEventKind::PlanCreated, None);
        }
        assert_eq!(vault.len(), 500);
        let sequences: Vec<u64> = vault.events().map(|e| e.sequence).collect();
        assert_eq!(sequences.first(), Some(&2));
        assert_eq!(sequences.last(), Some(&501));
        assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn test_purge_requires_confirmation() {
        let mut vault = AuditVault::default();
        vault.append_on(day(), VaultEventKind::PlanCreated, None);
        vault.append_on(day(), VaultEventKind::PlanExported, None);
        let before = vault.snapshot();

        assert_eq!(vault.purge_on(day(), false), PurgeOutcome::RequiresConfirmation);
        assert_eq!(vault.snapshot(), before);

        assert_eq!(vault.purge_on(day(), true), PurgeOutcome::Success(2));
        assert_eq!(vault.len(), 1);
        let marker = vault.events().next().unwrap();
        assert_eq!(marker.kind, VaultEventKind::VaultPurged);
        assert_eq!(marker.purged_count, Some(2));
        assert_eq!(marker.sequence, 3);
    }

    #[test]
    fn test_disabled_vault() {
        let mut vault = AuditVault::new(VaultConfig {
            enabled: false,
            ..VaultConfig::default()
        });
        assert_eq!(vault.append_on(day(), VaultEventKind::PlanCreated, None), None);
        assert!(vault.is_empty());
        assert_eq!(vault.purge_on(day(), true), PurgeOutcome::NotEnabled);
        assert!(matches!(vault.export_summary_on(day()), Err(AuditError::NotEnabled)));
    }

    #[test]
    fn test_export_is_bounded_and_clean() {
        let mut vault = AuditVault::new(VaultConfig {
            export_recent_limit: 3,
            ..VaultConfig::default()
        });
        for _ in 0..10 {
            let lineage = Lineage::new(
                ContextSlot::Messages,
                OutcomeType::Executed,
                PolicyDecision::UserApproved,
                RiskTier::Critical,
                day(),
            );
            vault.append_on(day(), VaultEventKind::ExecutionRecorded, Some(lineage));
        }
        let export = vault.export_summary_on(day()).unwrap();
        assert_eq!(export.recent.len(), 3);
        assert_eq!(export.recent[0].sequence, 8);
        assert_eq!(export.summary.total, 10);
        assert!(export.to_json_pretty().unwrap().contains("execution_recorded"));
    }

    #[test]
    fn test_restore_resumes_sequence() {
        let mut vault = AuditVault::default();
        for _ in 0..4 {
            vault.append_on(day(), VaultEventKind::PlanCreated, None);
        }
        let mut snapshot = vault.snapshot();
        snapshot.next_sequence = 0;

        let mut restored = AuditVault::restore(
            VaultConfig {
                capacity: 2,
                ..VaultConfig::default()
            },
            snapshot,
        );
        assert_eq!(restored.len(), 2);
        assert_eq!(
            restored.append_on(day(), VaultEventKind::PlanEdited, None),
            Some(5)
        );
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut vault = AuditVault::new(VaultConfig {
            capacity: 0,
            ..VaultConfig::default()
        });
        vault.append_on(day(), VaultEventKind::PlanCreated, None);
        assert_eq!(vault.len(), 1);
    }
}
