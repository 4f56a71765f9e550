//! Caller-held approval state.
//!
//! The gate is a pure function. Everything that changes over the life of a
//! review (approvals collected, whether the preview was shown, the two-key
//! request in flight) lives in an [`ApprovalFlow`] owned by whoever
//! coordinates the review.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use keystone_core::{PlanId, Timestamp};

use crate::effect::{EffectId, SideEffectLedger};
use crate::error::{ApprovalError, ApprovalResult};
use crate::two_key::{self, TwoKeyRequest};

/// One human approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Opaque approver handle (device or account id).
    pub approver: String,
    /// Whether the approval was made with a biometric/strong factor.
    pub biometric: bool,
    /// When it was given.
    pub at: Timestamp,
}

/// Approvals collected so far for one plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGrant {
    records: Vec<ApprovalRecord>,
    preview_shown: bool,
}

impl ApprovalGrant {
    /// No approvals, preview not shown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`ApprovalGrant::mark_preview_shown`].
    #[must_use]
    pub fn with_preview_shown(mut self) -> Self {
        self.preview_shown = true;
        self
    }

    /// Builder-style [`ApprovalGrant::record`].
    #[must_use]
    pub fn with_approval(
        mut self,
        approver: impl Into<String>,
        biometric: bool,
        at: Timestamp,
    ) -> Self {
        self.record(approver, biometric, at);
        self
    }

    /// Note that the preview was presented.
    pub fn mark_preview_shown(&mut self) {
        self.preview_shown = true;
    }

    /// Add an approval.
    pub fn record(&mut self, approver: impl Into<String>, biometric: bool, at: Timestamp) {
        self.records.push(ApprovalRecord {
            approver: approver.into(),
            biometric,
            at,
        });
    }

    /// Approvals in the order given.
    #[must_use]
    pub fn records(&self) -> &[ApprovalRecord] {
        &self.records
    }

    /// Number of approval events.
    #[must_use]
    pub fn approval_count(&self) -> usize {
        self.records.len()
    }

    /// Number of distinct approvers.
    #[must_use]
    pub fn distinct_approvers(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.approver.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Whether any approval used a biometric factor.
    #[must_use]
    pub fn biometric_verified(&self) -> bool {
        self.records.iter().any(|r| r.biometric)
    }

    /// Whether the preview was presented.
    #[must_use]
    pub fn preview_shown(&self) -> bool {
        self.preview_shown
    }

    /// Time of the first approval; cooldowns run from here.
    #[must_use]
    pub fn granted_at(&self) -> Option<Timestamp> {
        self.records.iter().map(|r| r.at).min()
    }
}

/// Review state for one plan and its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFlow {
    plan_id: PlanId,
    grant: ApprovalGrant,
    two_key: Option<TwoKeyRequest>,
}

impl ApprovalFlow {
    /// Fresh flow for a plan.
    #[must_use]
    pub fn new(plan_id: PlanId) -> Self {
        Self {
            plan_id,
            grant: ApprovalGrant::new(),
            two_key: None,
        }
    }

    /// The plan under review.
    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    /// Approvals collected so far.
    #[must_use]
    pub fn grant(&self) -> &ApprovalGrant {
        &self.grant
    }

    /// Provisional approval time handed to the execution subsystem.
    #[must_use]
    pub fn approval_timestamp(&self) -> Option<Timestamp> {
        self.grant.granted_at()
    }

    /// The two-key request in flight, if any.
    #[must_use]
    pub fn pending_two_key(&self) -> Option<&TwoKeyRequest> {
        self.two_key.as_ref()
    }

    /// Note that the preview was presented.
    pub fn mark_preview_shown(&mut self) {
        self.grant.mark_preview_shown();
    }

    /// Record a human approval.
    pub fn approve(&mut self, approver: impl Into<String>, biometric: bool, now: Timestamp) {
        self.grant.record(approver, biometric, now);
        info!(
            plan_id = %self.plan_id,
            approvals = self.grant.approval_count(),
            biometric,
            "approval recorded"
        );
    }

    fn check_ledger(&self, ledger: &SideEffectLedger) -> ApprovalResult<()> {
        if ledger.plan_id() == self.plan_id {
            Ok(())
        } else {
            Err(ApprovalError::LedgerMismatch {
                plan_id: self.plan_id,
                ledger_plan: ledger.plan_id(),
            })
        }
    }

    fn check_idle(&self) -> ApprovalResult<()> {
        match &self.two_key {
            Some(request) => Err(ApprovalError::ConfirmationInFlight(request.effect_id())),
            None => Ok(()),
        }
    }

    /// Explicitly opt a preview effect into its write counterpart.
    ///
    /// # Errors
    ///
    /// Fails if the ledger belongs to another plan, a request is already in
    /// flight, or the effect has no write counterpart.
    pub fn opt_in_write(
        &mut self,
        ledger: &mut SideEffectLedger,
        effect_id: EffectId,
        now: Timestamp,
    ) -> ApprovalResult<&TwoKeyRequest> {
        self.check_ledger(ledger)?;
        self.check_idle()?;
        let request = two_key::begin_upgrade(ledger, effect_id, now)?;
        Ok(self.two_key.insert(request))
    }

    /// Ask for the second key on an effect that was declared as a write.
    ///
    /// # Errors
    ///
    /// Fails if the ledger belongs to another plan, a request is already in
    /// flight, or the effect is not awaiting a second key.
    pub fn request_second_key(
        &mut self,
        ledger: &SideEffectLedger,
        effect_id: EffectId,
        now: Timestamp,
    ) -> ApprovalResult<&TwoKeyRequest> {
        self.check_ledger(ledger)?;
        self.check_idle()?;
        let request = two_key::begin_declared(ledger, effect_id, now)?;
        Ok(self.two_key.insert(request))
    }

    /// Grant the second key for the request in flight.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NoPendingConfirmation`] if nothing is in
    /// flight, or an error if the effect changed since it was shown. The
    /// request stays in flight on error.
    pub fn confirm_second_key(
        &mut self,
        ledger: &mut SideEffectLedger,
    ) -> ApprovalResult<EffectId> {
        self.check_ledger(ledger)?;
        let request = self
            .two_key
            .as_ref()
            .ok_or(ApprovalError::NoPendingConfirmation)?;
        two_key::confirm(ledger, request)?;
        let effect_id = request.effect_id();
        self.two_key = None;
        Ok(effect_id)
    }

    /// Abandon the request in flight.
    ///
    /// Undoes an upgrade and clears the provisional approval so it cannot be
    /// reused for a different effect set.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NoPendingConfirmation`] if nothing is in flight.
    pub fn cancel_second_key(&mut self, ledger: &mut SideEffectLedger) -> ApprovalResult<()> {
        self.check_ledger(ledger)?;
        let request = self.two_key.take().ok_or(ApprovalError::NoPendingConfirmation)?;
        two_key::cancel(ledger, &request)?;
        self.grant = ApprovalGrant::new();
        debug!(plan_id = %self.plan_id, "provisional approval cleared");
        Ok(())
    }

    /// Drop all collected state.
    pub fn reset(&mut self) {
        self.grant = ApprovalGrant::new();
        self.two_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{SideEffect, SideEffectKind};

    fn setup() -> (ApprovalFlow, SideEffectLedger, EffectId) {
        let plan_id = PlanId::new();
        let mut ledger = SideEffectLedger::new(plan_id);
        let id = ledger.push(SideEffect::new(SideEffectKind::PreviewReminder, "Pay rent"));
        (ApprovalFlow::new(plan_id), ledger, id)
    }

    #[test]
    fn test_grant_accounting() {
        let t0 = Timestamp::from_millis(1_000).unwrap();
        let t1 = Timestamp::from_millis(2_000).unwrap();
        let grant = ApprovalGrant::new()
            .with_approval("owner", false, t1)
            .with_approval("owner", true, t0);
        assert_eq!(grant.approval_count(), 2);
        assert_eq!(grant.distinct_approvers(), 1);
        assert!(grant.biometric_verified());
        assert_eq!(grant.granted_at(), Some(t0));
        assert!(!grant.preview_shown());
    }

    #[test]
    fn test_cancel_clears_approval() {
        let (mut flow, mut ledger, id) = setup();
        flow.mark_preview_shown();
        flow.approve("owner", true, Timestamp::now());
        assert!(flow.approval_timestamp().is_some());

        flow.opt_in_write(&mut ledger, id, Timestamp::now()).unwrap();
        flow.cancel_second_key(&mut ledger).unwrap();

        assert!(flow.approval_timestamp().is_none());
        assert!(!flow.grant().preview_shown());
        assert!(flow.pending_two_key().is_none());
        assert_eq!(ledger.get(id).unwrap().kind(), SideEffectKind::PreviewReminder);
    }

    #[test]
    fn test_confirm_grants_second_key() {
        let (mut flow, mut ledger, id) = setup();
        flow.opt_in_write(&mut ledger, id, Timestamp::now()).unwrap();
        assert_eq!(flow.confirm_second_key(&mut ledger).unwrap(), id);
        assert!(ledger.get(id).unwrap().second_confirmation_granted());
        assert!(flow.pending_two_key().is_none());
    }

    #[test]
    fn test_one_request_at_a_time() {
        let (mut flow, mut ledger, id) = setup();
        let other = ledger.push(SideEffect::new(SideEffectKind::PreviewCalendarEvent, "x"));
        flow.opt_in_write(&mut ledger, id, Timestamp::now()).unwrap();
        assert!(matches!(
            flow.opt_in_write(&mut ledger, other, Timestamp::now()),
            Err(ApprovalError::ConfirmationInFlight(pending)) if pending == id
        ));
    }

    #[test]
    fn test_nothing_to_confirm() {
        let (mut flow, mut ledger, _) = setup();
        assert!(matches!(
            flow.confirm_second_key(&mut ledger),
            Err(ApprovalError::NoPendingConfirmation)
        ));
        assert!(matches!(
            flow.cancel_second_key(&mut ledger),
            Err(ApprovalError::NoPendingConfirmation)
        ));
    }

    #[test]
    fn test_foreign_ledger_rejected() {
        let (mut flow, _, _) = setup();
        let mut foreign = SideEffectLedger::new(PlanId::new());
        let id = foreign.push(SideEffect::new(SideEffectKind::PreviewReminder, "x"));
        assert!(matches!(
            flow.opt_in_write(&mut foreign, id, Timestamp::now()),
            Err(ApprovalError::LedgerMismatch { .. })
        ));
    }
}
