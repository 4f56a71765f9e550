//! The approval gate: a pure decision over a plan, its approvals, its
//! side-effect ledger and a permission snapshot.
//!
//! ```text
//! PendingReview ──► TwoKeyPending ──► Approved
//!       │                 │
//!       └────► Denied ◄───┘   (tamper / mismatched inputs; terminal)
//! ```
//!
//! The gate holds no state beyond the verification key. A `Denied` decision
//! is final for those inputs: the caller must rebuild them and ask again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use keystone_core::{PermissionDomain, PermissionSnapshot, Timestamp};
use keystone_crypto::PlanSigner;

use crate::effect::SideEffectLedger;
use crate::flow::ApprovalGrant;
use crate::plan::AuthorizationPlan;
use crate::risk::RiskPolicy;

/// Where a plan stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Waiting on review items (acknowledgement, permission, approvals, cooldown).
    PendingReview,
    /// Review complete; waiting on second keys.
    TwoKeyPending,
    /// May execute.
    Approved,
    /// Rejected outright for these inputs.
    Denied,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingReview => write!(f, "pending_review"),
            Self::TwoKeyPending => write!(f, "two_key_pending"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
        }
    }
}

/// Why the gate did not allow execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// Signature mismatch.
    Tampered,
    /// The attached requirement is weaker than the plan's tier demands.
    RequirementMismatch,
    /// The ledger was built for another plan.
    LedgerMismatch,
    /// Enabled effects still unacknowledged.
    Unacknowledged {
        /// How many.
        count: usize,
    },
    /// An enabled effect needs a permission the host has not granted.
    PermissionMissing {
        /// The first missing permission.
        permission: PermissionDomain,
    },
    /// The preview has not been shown.
    PreviewRequired,
    /// Not enough approvals.
    ApprovalMissing {
        /// Approvals required.
        needed: u8,
        /// Approvals given.
        have: usize,
    },
    /// Not enough distinct approvers.
    SignersMissing {
        /// Approvers required.
        needed: u8,
        /// Distinct approvers so far.
        have: usize,
    },
    /// No approval was made with a biometric factor.
    BiometricRequired,
    /// Effects still waiting for their second key.
    TwoKeyPending {
        /// How many.
        count: usize,
    },
    /// The cooldown since the first approval has not elapsed.
    CooldownActive {
        /// Whole seconds left (rounded up).
        remaining_secs: u64,
    },
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tampered => write!(
                f,
                "plan signature is invalid; the plan was modified after signing"
            ),
            Self::RequirementMismatch => {
                write!(f, "approval requirement is weaker than the plan's risk tier demands")
            },
            Self::LedgerMismatch => write!(f, "side effects belong to a different plan"),
            Self::Unacknowledged { count } => {
                write!(f, "{count} side effect{} not acknowledged", plural(*count))
            },
            Self::PermissionMissing { permission } => {
                write!(f, "{permission} permission not granted")
            },
            Self::PreviewRequired => write!(f, "preview must be shown before approval"),
            Self::ApprovalMissing { needed, have } => {
                write!(f, "{have} of {needed} approvals given")
            },
            Self::SignersMissing { needed, have } => {
                write!(f, "{have} of {needed} distinct approvers")
            },
            Self::BiometricRequired => write!(f, "biometric confirmation required"),
            Self::TwoKeyPending { count } => write!(
                f,
                "{count} side effect{} awaiting second confirmation",
                plural(*count)
            ),
            Self::CooldownActive { remaining_secs } => {
                write!(f, "cooldown active: {remaining_secs}s remaining")
            },
        }
    }
}

/// Outcome of [`ApprovalGate::can_execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether execution may proceed.
    pub allow: bool,
    /// Resulting state.
    pub state: GateState,
    /// Why not, when `allow` is false.
    pub reason: Option<BlockReason>,
}

impl GateDecision {
    fn approved() -> Self {
        Self {
            allow: true,
            state: GateState::Approved,
            reason: None,
        }
    }

    fn blocked(state: GateState, reason: BlockReason) -> Self {
        Self {
            allow: false,
            state,
            reason: Some(reason),
        }
    }

    /// Display text for the decision.
    #[must_use]
    pub fn reason_text(&self) -> String {
        self.reason
            .as_ref()
            .map_or_else(|| "approved".to_string(), ToString::to_string)
    }
}

/// Decides whether a plan may execute.
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    signer: Arc<PlanSigner>,
    policy: RiskPolicy,
}

impl ApprovalGate {
    /// Create a gate that verifies with `signer` under the default policy.
    #[must_use]
    pub fn new(signer: Arc<PlanSigner>) -> Self {
        Self {
            signer,
            policy: RiskPolicy::default(),
        }
    }

    /// Check attached requirements against `policy` instead of the default.
    #[must_use]
    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Evaluate the full bundle at `now`.
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// integrity (signature, requirement, ledger ownership), then review
    /// items (acknowledgement, permissions, preview, approvals, approvers,
    /// biometric), then second keys, then cooldown.
    #[must_use]
    pub fn can_execute(
        &self,
        plan: &AuthorizationPlan,
        grant: &ApprovalGrant,
        ledger: &SideEffectLedger,
        permissions: &PermissionSnapshot,
        now: Timestamp,
    ) -> GateDecision {
        let decision = self.evaluate(plan, grant, ledger, permissions, now);
        debug!(
            plan_id = %plan.id(),
            state = %decision.state,
            allow = decision.allow,
            "gate evaluated"
        );
        decision
    }

    fn evaluate(
        &self,
        plan: &AuthorizationPlan,
        grant: &ApprovalGrant,
        ledger: &SideEffectLedger,
        permissions: &PermissionSnapshot,
        now: Timestamp,
    ) -> GateDecision {
        use GateState::{Denied, PendingReview, TwoKeyPending};

        if !plan.verify_signature(&self.signer) {
            warn!(plan_id = %plan.id(), "gate rejected tampered plan");
            return GateDecision::blocked(Denied, BlockReason::Tampered);
        }
        if !plan.requirement_satisfies(&self.policy) {
            warn!(
                plan_id = %plan.id(),
                tier = %plan.tier(),
                "gate rejected weakened requirement"
            );
            return GateDecision::blocked(Denied, BlockReason::RequirementMismatch);
        }
        if ledger.plan_id() != plan.id() {
            return GateDecision::blocked(Denied, BlockReason::LedgerMismatch);
        }

        let count = ledger.unacknowledged_count();
        if count > 0 {
            return GateDecision::blocked(PendingReview, BlockReason::Unacknowledged { count });
        }
        if let Some(&permission) = ledger.missing_permissions(permissions).first() {
            return GateDecision::blocked(
                PendingReview,
                BlockReason::PermissionMissing { permission },
            );
        }

        let requirement = plan.requirement();
        if requirement.preview_required && !grant.preview_shown() {
            return GateDecision::blocked(PendingReview, BlockReason::PreviewRequired);
        }
        let have = grant.approval_count();
        if have < usize::from(requirement.approvals_needed) {
            return GateDecision::blocked(
                PendingReview,
                BlockReason::ApprovalMissing {
                    needed: requirement.approvals_needed,
                    have,
                },
            );
        }
        let signers = grant.distinct_approvers();
        if signers < usize::from(requirement.multi_signer_count) {
            return GateDecision::blocked(
                PendingReview,
                BlockReason::SignersMissing {
                    needed: requirement.multi_signer_count,
                    have: signers,
                },
            );
        }
        if requirement.requires_biometric && !grant.biometric_verified() {
            return GateDecision::blocked(PendingReview, BlockReason::BiometricRequired);
        }

        let pending = ledger.pending_two_key().len();
        if pending > 0 {
            return GateDecision::blocked(
                TwoKeyPending,
                BlockReason::TwoKeyPending { count: pending },
            );
        }

        if let Some(remaining_secs) = cooldown_remaining(requirement.cooldown_secs, grant, now) {
            return GateDecision::blocked(
                PendingReview,
                BlockReason::CooldownActive { remaining_secs },
            );
        }

        GateDecision::approved()
    }
}

/// Seconds left before `granted_at + cooldown`, or `None` once it has passed.
///
/// A cooldown with no approval on record has not started, so it is reported
/// as the full duration.
fn cooldown_remaining(cooldown_secs: u64, grant: &ApprovalGrant, now: Timestamp) -> Option<u64> {
    if cooldown_secs == 0 {
        return None;
    }
    let Some(granted_at) = grant.granted_at() else {
        return Some(cooldown_secs);
    };
    let cooldown_ms = i64::try_from(cooldown_secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    let elapsed_ms = now.since(&granted_at).num_milliseconds();
    let remaining_ms = cooldown_ms.saturating_sub(elapsed_ms);
    if remaining_ms <= 0 {
        return None;
    }
    Some(u64::try_from(remaining_ms).unwrap_or(u64::MAX).div_ceil(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{SideEffect, SideEffectKind};
    use crate::flow::ApprovalFlow;
    use crate::plan::{IntentKind, PlanBuilder};
    use crate::risk::ReversibilityClass;
    use keystone_core::PlanId;
    use keystone_crypto::SigningSecret;

    fn signer() -> Arc<PlanSigner> {
        Arc::new(PlanSigner::new(&SigningSecret::from_bytes(&[9u8; 32]).unwrap()).unwrap())
    }

    fn plan(signer: &PlanSigner, base: i32, rev: ReversibilityClass) -> AuthorizationPlan {
        PlanBuilder::new()
            .intent(IntentKind::CreateReminder, "reminder", "Reminders")
            .base_risk(base)
            .reversibility(rev, "reason")
            .build(signer)
            .unwrap()
    }

    fn at(secs: i64) -> Timestamp {
        let millis = 1_760_000_000_000_i64.saturating_add(secs.saturating_mul(1000));
        Timestamp::from_millis(millis).unwrap()
    }

    fn all_permissions() -> PermissionSnapshot {
        PermissionSnapshot::new()
            .grant(PermissionDomain::Calendar)
            .grant(PermissionDomain::Reminders)
            .grant(PermissionDomain::Messages)
    }

    #[test]
    fn test_low_tier_auto_approves() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 5, ReversibilityClass::Reversible);
        let ledger = SideEffectLedger::new(p.id());
        let decision = gate.can_execute(
            &p,
            &ApprovalGrant::new(),
            &ledger,
            &PermissionSnapshot::new(),
            at(0),
        );
        assert!(decision.allow);
        assert_eq!(decision.state, GateState::Approved);
        assert_eq!(decision.reason_text(), "approved");
    }

    #[test]
    fn test_one_of_two_acknowledged() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 5, ReversibilityClass::Reversible);
        let mut ledger = SideEffectLedger::new(p.id());
        let first = ledger.push(SideEffect::new(SideEffectKind::SaveToMemory, "a"));
        ledger.push(SideEffect::new(SideEffectKind::SaveToMemory, "b"));
        ledger.acknowledge(first).unwrap();

        let decision = gate.can_execute(
            &p,
            &ApprovalGrant::new(),
            &ledger,
            &all_permissions(),
            at(0),
        );
        assert!(!decision.allow);
        assert_eq!(decision.state, GateState::PendingReview);
        assert_eq!(decision.reason, Some(BlockReason::Unacknowledged { count: 1 }));
        assert_eq!(decision.reason_text(), "1 side effect not acknowledged");
    }

    #[test]
    fn test_disabled_effects_ignored() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 5, ReversibilityClass::Reversible);
        let ledger = SideEffectLedger::new(p.id())
            .with_effect(SideEffect::new(SideEffectKind::SendMessage, "x").disabled());
        let decision = gate.can_execute(
            &p,
            &ApprovalGrant::new(),
            &ledger,
            &PermissionSnapshot::new(),
            at(0),
        );
        assert!(decision.allow);
    }

    #[test]
    fn test_missing_permission_named() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 5, ReversibilityClass::Reversible);
        let mut ledger = SideEffectLedger::new(p.id())
            .with_effect(SideEffect::new(SideEffectKind::SendMessage, "x"));
        ledger.acknowledge_all();
        let decision = gate.can_execute(
            &p,
            &ApprovalGrant::new(),
            &ledger,
            &PermissionSnapshot::new(),
            at(0),
        );
        assert_eq!(
            decision.reason,
            Some(BlockReason::PermissionMissing {
                permission: PermissionDomain::Messages
            })
        );
        assert_eq!(decision.reason_text(), "messages permission not granted");
    }

    #[test]
    fn test_two_key_blocks_until_confirmed() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 30, ReversibilityClass::Reversible);
        let mut ledger = SideEffectLedger::new(p.id());
        let id = ledger.push(SideEffect::new(SideEffectKind::PreviewReminder, "x"));
        let mut flow = ApprovalFlow::new(p.id());
        flow.mark_preview_shown();
        flow.approve("owner", false, at(0));

        flow.opt_in_write(&mut ledger, id, at(1)).unwrap();
        ledger.acknowledge_all();

        let blocked = gate.can_execute(&p, flow.grant(), &ledger, &all_permissions(), at(2));
        assert!(!blocked.allow);
        assert_eq!(blocked.state, GateState::TwoKeyPending);
        assert_eq!(blocked.reason, Some(BlockReason::TwoKeyPending { count: 1 }));

        flow.confirm_second_key(&mut ledger).unwrap();
        let allowed = gate.can_execute(&p, flow.grant(), &ledger, &all_permissions(), at(2));
        assert!(allowed.allow);
    }

    #[test]
    fn test_tampered_plan_denied() {
        let s = signer();
        let p = plan(&s, 5, ReversibilityClass::Reversible);
        let mut json = serde_json::to_value(&p).unwrap();
        json["risk_score"] = serde_json::json!(4);
        let forged: AuthorizationPlan = serde_json::from_value(json).unwrap();

        let gate = ApprovalGate::new(s);
        let ledger = SideEffectLedger::new(forged.id());
        let decision = gate.can_execute(
            &forged,
            &ApprovalGrant::new(),
            &ledger,
            &PermissionSnapshot::new(),
            at(0),
        );
        assert!(!decision.allow);
        assert_eq!(decision.state, GateState::Denied);
        assert_eq!(decision.reason, Some(BlockReason::Tampered));
    }

    #[test]
    fn test_foreign_ledger_denied() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 5, ReversibilityClass::Reversible);
        let ledger = SideEffectLedger::new(PlanId::new());
        let decision = gate.can_execute(
            &p,
            &ApprovalGrant::new(),
            &ledger,
            &PermissionSnapshot::new(),
            at(0),
        );
        assert_eq!(decision.reason, Some(BlockReason::LedgerMismatch));
    }

    #[test]
    fn test_high_tier_needs_biometric() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 40, ReversibilityClass::PartiallyReversible);
        let ledger = SideEffectLedger::new(p.id());
        let perms = PermissionSnapshot::new();

        let grant = ApprovalGrant::new();
        let d = gate.can_execute(&p, &grant, &ledger, &perms, at(0));
        assert_eq!(d.reason, Some(BlockReason::PreviewRequired));

        let grant = grant.with_preview_shown();
        let d = gate.can_execute(&p, &grant, &ledger, &perms, at(0));
        assert_eq!(d.reason, Some(BlockReason::ApprovalMissing { needed: 1, have: 0 }));

        let grant = grant.with_approval("owner", false, at(0));
        let d = gate.can_execute(&p, &grant, &ledger, &perms, at(0));
        assert_eq!(d.reason, Some(BlockReason::BiometricRequired));

        let grant = grant.with_approval("owner", true, at(1));
        assert!(gate.can_execute(&p, &grant, &ledger, &perms, at(1)).allow);
    }

    #[test]
    fn test_critical_cooldown() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 60, ReversibilityClass::Irreversible);
        assert_eq!(p.requirement().cooldown_secs, 30);
        let ledger = SideEffectLedger::new(p.id());
        let perms = PermissionSnapshot::new();
        let grant = ApprovalGrant::new()
            .with_preview_shown()
            .with_approval("owner", true, at(0))
            .with_approval("owner", true, at(5));

        let d = gate.can_execute(&p, &grant, &ledger, &perms, at(10));
        assert_eq!(d.reason, Some(BlockReason::CooldownActive { remaining_secs: 20 }));
        assert_eq!(d.state, GateState::PendingReview);

        let d = gate.can_execute(&p, &grant, &ledger, &perms, at(30));
        assert!(d.allow);
    }

    #[test]
    fn test_stripped_cooldown_denied() {
        let s = signer();
        let gate = ApprovalGate::new(s.clone());
        let p = plan(&s, 60, ReversibilityClass::Irreversible);
        let mut json = serde_json::to_value(&p).unwrap();
        json["requirement"]["cooldown_secs"] = serde_json::json!(0);
        let stripped: AuthorizationPlan = serde_json::from_value(json).unwrap();
        assert!(stripped.verify_signature(&s));

        let ledger = SideEffectLedger::new(p.id());
        let grant = ApprovalGrant::new()
            .with_preview_shown()
            .with_approval("owner", true, at(0))
            .with_approval("owner", true, at(0));
        let perms = PermissionSnapshot::new();

        let d = gate.can_execute(&stripped, &grant, &ledger, &perms, at(0));
        assert!(!d.allow);
        assert_eq!(d.state, GateState::Denied);
        assert_eq!(d.reason, Some(BlockReason::RequirementMismatch));

        let d = gate.can_execute(&p, &grant, &ledger, &perms, at(0));
        assert_eq!(d.reason, Some(BlockReason::CooldownActive { remaining_secs: 30 }));
    }

    #[test]
    fn test_configured_policy_raises_floor() {
        let s = signer();
        let p = plan(&s, 60, ReversibilityClass::Irreversible);
        let ledger = SideEffectLedger::new(p.id());
        let strict = ApprovalGate::new(s.clone())
            .with_policy(RiskPolicy::default().with_critical_signers(2));

        let d = strict.can_execute(
            &p,
            &ApprovalGrant::new(),
            &ledger,
            &PermissionSnapshot::new(),
            at(0),
        );
        assert_eq!(d.reason, Some(BlockReason::RequirementMismatch));
    }

    #[test]
    fn test_cooldown_rounds_up() {
        let grant = ApprovalGrant::new().with_approval("a", true, at(0));
        let now = Timestamp::from_millis(at(0).millis().saturating_add(29_001)).unwrap();
        assert_eq!(cooldown_remaining(30, &grant, now), Some(1));
        assert_eq!(cooldown_remaining(0, &grant, now), None);
        assert_eq!(cooldown_remaining(30, &ApprovalGrant::new(), now), Some(30));
    }
}
