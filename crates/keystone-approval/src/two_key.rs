//! Two-key confirmation for effects that write to an external store.
//!
//! A two-key request always carries the literal operation details (kind,
//! description, target permission, payload) so the confirmation surface can
//! show exactly what will be written. A request starts in one of two ways:
//!
//! - **Upgrade**: the user explicitly opts a preview-only effect into its
//!   write counterpart. The upgraded effect starts without a second
//!   confirmation.
//! - **Declared**: the plan already declared a two-key effect and it still
//!   needs its second key.
//!
//! Only [`confirm`] flips `second_confirmation_granted`. [`cancel`] undoes an
//! upgrade. Both are driven by [`crate::flow::ApprovalFlow`], which also
//! clears the provisional approval on cancel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use keystone_core::{PermissionDomain, Timestamp};

use crate::effect::{EffectId, SideEffect, SideEffectKind, SideEffectLedger};
use crate::error::{ApprovalError, ApprovalResult};

/// What exactly the second key is being asked to authorize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDetails {
    /// The effect being confirmed.
    pub effect_id: EffectId,
    /// Write kind that will run.
    pub kind: SideEffectKind,
    /// Human description of the effect.
    pub description: String,
    /// Permission the write uses.
    pub permission: Option<PermissionDomain>,
    /// Literal fields that will be written.
    pub payload: BTreeMap<String, String>,
}

impl OperationDetails {
    fn from_effect(effect: &SideEffect) -> Self {
        Self {
            effect_id: effect.id(),
            kind: effect.kind(),
            description: effect.description().to_string(),
            permission: effect.permission(),
            payload: effect.payload().clone(),
        }
    }

    /// Lines for the confirmation surface, starting with the action.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("{}: {}", self.kind.display_name(), self.description)];
        lines.extend(self.payload.iter().map(|(k, v)| format!("{k}: {v}")));
        if let Some(permission) = self.permission {
            lines.push(format!("uses {permission} access"));
        }
        lines
    }
}

/// How a two-key request came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TwoKeyOrigin {
    /// A preview was upgraded; cancelling restores `from`.
    Upgrade {
        /// Kind before the upgrade.
        from: SideEffectKind,
    },
    /// The plan declared the write directly.
    Declared,
}

/// A second-key request in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoKeyRequest {
    /// Origin of the request.
    pub origin: TwoKeyOrigin,
    /// Literal operation details shown to the user.
    pub details: OperationDetails,
    /// When the request was raised.
    pub requested_at: Timestamp,
}

impl TwoKeyRequest {
    /// The effect this request targets.
    #[must_use]
    pub fn effect_id(&self) -> EffectId {
        self.details.effect_id
    }
}

/// Upgrade a preview effect to its write counterpart and raise a request.
pub(crate) fn begin_upgrade(
    ledger: &mut SideEffectLedger,
    effect_id: EffectId,
    now: Timestamp,
) -> ApprovalResult<TwoKeyRequest> {
    let from = ledger.upgrade_to_write(effect_id)?;
    let effect = ledger
        .get(effect_id)
        .ok_or(ApprovalError::UnknownEffect(effect_id))?;
    info!(
        effect_id = %effect_id,
        from = %from,
        to = %effect.kind(),
        "preview upgraded to write; second key required"
    );
    Ok(TwoKeyRequest {
        origin: TwoKeyOrigin::Upgrade { from },
        details: OperationDetails::from_effect(effect),
        requested_at: now,
    })
}

/// Raise a request for a declared two-key effect.
pub(crate) fn begin_declared(
    ledger: &SideEffectLedger,
    effect_id: EffectId,
    now: Timestamp,
) -> ApprovalResult<TwoKeyRequest> {
    let effect = ledger
        .get(effect_id)
        .ok_or(ApprovalError::UnknownEffect(effect_id))?;
    if !effect.awaiting_second_key() {
        return Err(ApprovalError::InvalidTransition {
            effect_id,
            operation: "request second key",
            reason: "effect is not awaiting a second confirmation".to_string(),
        });
    }
    debug!(effect_id = %effect_id, kind = %effect.kind(), "second key requested");
    Ok(TwoKeyRequest {
        origin: TwoKeyOrigin::Declared,
        details: OperationDetails::from_effect(effect),
        requested_at: now,
    })
}

/// Grant the second key, provided the effect still matches what was shown.
pub(crate) fn confirm(
    ledger: &mut SideEffectLedger,
    request: &TwoKeyRequest,
) -> ApprovalResult<()> {
    let effect_id = request.effect_id();
    let effect = ledger
        .get(effect_id)
        .ok_or(ApprovalError::UnknownEffect(effect_id))?;
    if effect.kind() != request.details.kind || effect.payload() != &request.details.payload {
        return Err(ApprovalError::InvalidTransition {
            effect_id,
            operation: "confirm",
            reason: "effect changed since the confirmation was shown".to_string(),
        });
    }
    ledger.grant_second_confirmation(effect_id)?;
    info!(effect_id = %effect_id, kind = %request.details.kind, "second key granted");
    Ok(())
}

/// Abandon a request, undoing an upgrade if there was one.
pub(crate) fn cancel(ledger: &mut SideEffectLedger, request: &TwoKeyRequest) -> ApprovalResult<()> {
    let effect_id = request.effect_id();
    match request.origin {
        TwoKeyOrigin::Upgrade { from } => ledger.revert_kind(effect_id, from)?,
        TwoKeyOrigin::Declared => {},
    }
    info!(effect_id = %effect_id, "two-key request cancelled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::PlanId;

    #[test]
    fn test_upgrade_request_shows_literal_details() {
        let mut ledger = SideEffectLedger::new(PlanId::new());
        let id = ledger.push(
            SideEffect::new(SideEffectKind::PreviewCalendarEvent, "Dentist")
                .with_payload("starts", "2026-10-21T09:00"),
        );
        let request = begin_upgrade(&mut ledger, id, Timestamp::now()).unwrap();
        assert_eq!(
            request.origin,
            TwoKeyOrigin::Upgrade {
                from: SideEffectKind::PreviewCalendarEvent
            }
        );
        let lines = request.details.lines();
        assert_eq!(lines[0], "Create calendar event: Dentist");
        assert!(lines.contains(&"starts: 2026-10-21T09:00".to_string()));
        assert!(lines.contains(&"uses calendar access".to_string()));
    }

    #[test]
    fn test_confirm_then_cancel_paths() {
        let mut ledger = SideEffectLedger::new(PlanId::new());
        let id = ledger.push(SideEffect::new(SideEffectKind::PreviewReminder, "Call mom"));

        let request = begin_upgrade(&mut ledger, id, Timestamp::now()).unwrap();
        cancel(&mut ledger, &request).unwrap();
        assert_eq!(
            ledger.get(id).unwrap().kind(),
            SideEffectKind::PreviewReminder
        );
        assert!(ledger.pending_two_key().is_empty());

        let request = begin_upgrade(&mut ledger, id, Timestamp::now()).unwrap();
        confirm(&mut ledger, &request).unwrap();
        assert!(ledger.get(id).unwrap().second_confirmation_granted());
    }

    #[test]
    fn test_declared_requires_pending_effect() {
        let mut ledger = SideEffectLedger::new(PlanId::new());
        let write = ledger.push(SideEffect::new(SideEffectKind::CreateReminder, "Trash day"));
        let preview = ledger.push(SideEffect::new(SideEffectKind::PreviewReminder, "x"));

        assert!(begin_declared(&ledger, preview, Timestamp::now()).is_err());
        let request = begin_declared(&ledger, write, Timestamp::now()).unwrap();
        assert_eq!(request.origin, TwoKeyOrigin::Declared);

        cancel(&mut ledger, &request).unwrap();
        assert_eq!(ledger.get(write).unwrap().kind(), SideEffectKind::CreateReminder);
    }

    #[test]
    fn test_confirm_rejects_stale_request() {
        let mut ledger = SideEffectLedger::new(PlanId::new());
        let id = ledger.push(SideEffect::new(SideEffectKind::PreviewReminder, "x"));
        let request = begin_upgrade(&mut ledger, id, Timestamp::now()).unwrap();
        ledger.revert_kind(id, SideEffectKind::PreviewReminder).unwrap();
        assert!(matches!(
            confirm(&mut ledger, &request),
            Err(ApprovalError::InvalidTransition { .. })
        ));
        assert!(matches!(
            cancel(&mut ledger, &request),
            Err(ApprovalError::InvalidTransition { .. })
        ));
    }
}
