//! Vault summaries, computed by a single linear scan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use keystone_core::DayStamp;

use crate::event::{AuditVaultEvent, VaultEventKind};

/// Size of the rolling window, in days (today included).
pub const ROLLING_WINDOW_DAYS: i64 = 7;

/// Aggregate view of the vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSummary {
    /// Events retained.
    pub total: usize,
    /// Events recorded within the last seven days.
    pub last_7_days: usize,
    /// Count per kind.
    pub by_kind: BTreeMap<VaultEventKind, usize>,
    /// Number of edit events.
    pub edit_count: usize,
    /// Number of export events.
    pub export_count: usize,
    /// Most recent verification day.
    pub last_verified: Option<DayStamp>,
    /// Lowest retained sequence number.
    pub oldest_sequence: Option<u64>,
    /// Highest retained sequence number.
    pub newest_sequence: Option<u64>,
}

impl VaultSummary {
    /// Summarize `events` as of `today`.
    pub fn from_events<'a>(
        events: impl IntoIterator<Item = &'a AuditVaultEvent>,
        today: DayStamp,
    ) -> Self {
        let mut summary = Self::default();
        for event in events {
            summary.total = summary.total.saturating_add(1);

            let age = event.created.days_until(&today);
            if (0..ROLLING_WINDOW_DAYS).contains(&age) {
                summary.last_7_days = summary.last_7_days.saturating_add(1);
            }

            let count = summary.by_kind.entry(event.kind).or_insert(0);
            *count = count.saturating_add(1);

            match event.kind {
                VaultEventKind::PlanEdited => {
                    summary.edit_count = summary.edit_count.saturating_add(1);
                },
                VaultEventKind::PlanExported => {
                    summary.export_count = summary.export_count.saturating_add(1);
                },
                VaultEventKind::AuthorizationVerified => {
                    summary.last_verified = summary.last_verified.max(Some(event.created));
                },
                VaultEventKind::PlanCreated
                | VaultEventKind::ExecutionRecorded
                | VaultEventKind::VaultPurged => {},
            }

            summary.oldest_sequence = Some(
                summary
                    .oldest_sequence
                    .map_or(event.sequence, |s| s.min(event.sequence)),
            );
            summary.newest_sequence = summary.newest_sequence.max(Some(event.sequence));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::VAULT_SCHEMA_VERSION;

    fn event(sequence: u64, kind: VaultEventKind, day: u32) -> AuditVaultEvent {
        AuditVaultEvent {
            sequence,
            created: DayStamp::from_ymd(2026, 10, day).unwrap(),
            kind,
            lineage: None,
            purged_count: None,
            schema_version: VAULT_SCHEMA_VERSION,
        }
    }

    #[test]
    fn test_empty() {
        let events: Vec<AuditVaultEvent> = Vec::new();
        let summary = VaultSummary::from_events(&events, DayStamp::from_ymd(2026, 10, 19).unwrap());
        assert_eq!(summary, VaultSummary::default());
    }

    #[test]
    fn test_counts_and_window() {
        let events = vec![
            event(1, VaultEventKind::PlanCreated, 1),
            event(2, VaultEventKind::PlanEdited, 12),
            event(3, VaultEventKind::PlanEdited, 13),
            event(4, VaultEventKind::AuthorizationVerified, 14),
            event(5, VaultEventKind::PlanExported, 18),
            event(6, VaultEventKind::AuthorizationVerified, 19),
        ];
        let today = DayStamp::from_ymd(2026, 10, 19).unwrap();
        let summary = VaultSummary::from_events(&events, today);

        assert_eq!(summary.total, 6);
        assert_eq!(summary.last_7_days, 4);
        assert_eq!(summary.edit_count, 2);
        assert_eq!(summary.export_count, 1);
        assert_eq!(summary.by_kind[&VaultEventKind::AuthorizationVerified], 2);
        assert_eq!(summary.last_verified, Some(today));
        assert_eq!(summary.oldest_sequence, Some(1));
        assert_eq!(summary.newest_sequence, Some(6));
    }
}
