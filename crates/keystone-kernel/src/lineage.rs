//! Translation from plans and decisions to content-free lineage records.

use keystone_approval::{
    AuthorizationPlan, GateDecision, GateState, IntentKind, RequirementKind, SideEffectLedger,
};
use keystone_audit::{ContextSlot, Lineage, OutcomeType, PolicyDecision};
use keystone_core::{DayStamp, LineageId};
use keystone_crypto::ContentHash;

/// Context slot an intent belongs to.
#[must_use]
pub fn context_slot(kind: IntentKind) -> ContextSlot {
    match kind {
        IntentKind::SendMessage | IntentKind::ReplyMessage => ContextSlot::Messages,
        IntentKind::CreateReminder => ContextSlot::Reminders,
        IntentKind::ScheduleEvent | IntentKind::UpdateEvent => ContextSlot::Calendar,
        IntentKind::SaveMemory => ContextSlot::Memory,
        IntentKind::Summarize => ContextSlot::General,
    }
}

/// Digest of the intent kind and step sequence.
///
/// Two plans that would run the same procedure share a hash; the hash
/// reveals nothing about the procedure itself.
#[must_use]
pub fn procedure_hash(plan: &AuthorizationPlan) -> ContentHash {
    let mut parts: Vec<&[u8]> = vec![plan.intent().kind.as_str().as_bytes()];
    for step in plan.steps() {
        parts.push(step.action.as_bytes());
        parts.push(if step.mutates_state { &b"w"[..] } else { &b"r"[..] });
    }
    ContentHash::hash_multi(&parts)
}

/// The policy path an allowed plan took.
#[must_use]
pub fn approved_policy(plan: &AuthorizationPlan, ledger: &SideEffectLedger) -> PolicyDecision {
    if ledger
        .enabled()
        .any(keystone_approval::SideEffect::second_confirmation_granted)
    {
        PolicyDecision::TwoKeyConfirmed
    } else if plan.requirement().kind == RequirementKind::AutoApprove {
        PolicyDecision::AutoApproved
    } else {
        PolicyDecision::UserApproved
    }
}

/// Policy recorded for a gate decision.
#[must_use]
pub fn decision_policy(
    plan: &AuthorizationPlan,
    ledger: &SideEffectLedger,
    decision: &GateDecision,
) -> PolicyDecision {
    if decision.allow {
        return approved_policy(plan, ledger);
    }
    match decision.state {
        GateState::Denied => PolicyDecision::Denied,
        GateState::PendingReview | GateState::TwoKeyPending | GateState::Approved => {
            PolicyDecision::Blocked
        },
    }
}

/// Build the lineage for `plan` with the given outcome.
///
/// The lineage id is derived from the plan id so every event about one plan
/// shares a lineage.
#[must_use]
pub fn lineage_for(
    plan: &AuthorizationPlan,
    outcome: OutcomeType,
    policy: PolicyDecision,
    edits: u32,
    today: DayStamp,
) -> Lineage {
    Lineage::new(
        context_slot(plan.intent().kind),
        outcome,
        policy,
        plan.tier(),
        plan.created_at().day(),
    )
    .with_id(LineageId::from_uuid(plan.id().0))
    .with_procedure_hash(procedure_hash(plan))
    .with_edit_count(edits)
    .with_modified(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_approval::{
        ExecutionStep, PlanBuilder, ReversibilityClass, SideEffect, SideEffectKind,
    };
    use keystone_test::fixtures::test_signer;

    fn plan(base: i32, steps: &[&str]) -> AuthorizationPlan {
        let mut builder = PlanBuilder::new()
            .intent(IntentKind::CreateReminder, "Water plants", "reminders")
            .base_risk(base)
            .reversibility(ReversibilityClass::Reversible, "can be deleted");
        for step in steps {
            builder = builder.step(ExecutionStep::mutation(*step, None));
        }
        builder.build(&test_signer()).unwrap()
    }

    #[test]
    fn test_procedure_hash_ignores_content() {
        let a = plan(10, &["create_reminder"]);
        let b = plan(10, &["create_reminder"]);
        let c = plan(10, &["create_reminder", "notify"]);
        assert_eq!(procedure_hash(&a), procedure_hash(&b));
        assert_ne!(procedure_hash(&a), procedure_hash(&c));
    }

    #[test]
    fn test_lineage_links_plan() {
        let p = plan(10, &[]);
        let today = p.created_at().day();
        let lineage = lineage_for(&p, OutcomeType::Drafted, PolicyDecision::AutoApproved, 2, today);
        assert_eq!(lineage.id.0, p.id().0);
        assert_eq!(lineage.context_slot, ContextSlot::Reminders);
        assert_eq!(lineage.edit_count, 2);
        assert!(lineage.verify_hash());
    }

    #[test]
    fn test_approved_policy() {
        let low = plan(0, &[]);
        let ledger = SideEffectLedger::new(low.id());
        assert_eq!(approved_policy(&low, &ledger), PolicyDecision::AutoApproved);

        let medium = plan(30, &[]);
        let ledger = SideEffectLedger::new(medium.id())
            .with_effect(SideEffect::new(SideEffectKind::PreviewReminder, "Preview"));
        assert_eq!(approved_policy(&medium, &ledger), PolicyDecision::UserApproved);
    }
}
