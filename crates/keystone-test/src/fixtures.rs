//! Test fixtures for common types.

use std::sync::Arc;

use keystone_approval::{
    AuthorizationPlan, EffectId, ExecutionStep, IntentKind, PlanBuilder, Probe, ProbeKind,
    ReversibilityClass, SideEffect, SideEffectKind, SideEffectLedger,
};
use keystone_core::{PermissionDomain, PermissionSnapshot, PlanId, Timestamp};
use keystone_crypto::{PlanSigner, SigningSecret};

/// Fixed 32-byte secret shared by every fixture signer.
pub const TEST_SECRET_BYTES: &[u8; 32] = b"keystone-test-secret-0123456789!";

/// A fixed instant (2026-10-19T00:00:00Z) for deterministic gate tests.
pub const TEST_NOW_MILLIS: i64 = 1_792_368_000_000;

/// The fixture signing secret.
#[must_use]
pub fn test_secret() -> SigningSecret {
    SigningSecret::from_bytes(TEST_SECRET_BYTES).expect("fixture secret meets the minimum length")
}

/// A signer over [`test_secret`].
#[must_use]
pub fn test_signer() -> PlanSigner {
    PlanSigner::new(&test_secret()).expect("fixture secret is a valid MAC key")
}

/// [`test_signer`] behind an `Arc`, as the gate wants it.
#[must_use]
pub fn test_signer_arc() -> Arc<PlanSigner> {
    Arc::new(test_signer())
}

/// The fixed test instant.
#[must_use]
pub fn test_now() -> Timestamp {
    Timestamp::from_millis(TEST_NOW_MILLIS).expect("fixture instant is in range")
}

/// Send a message: base 60, irreversible. Scores 90, tier critical.
#[must_use]
pub fn send_message_builder() -> PlanBuilder {
    PlanBuilder::new()
        .intent(IntentKind::SendMessage, "Reply to Sam about Friday", "sam")
        .base_risk(60)
        .risk_reason("message leaves the device")
        .reversibility(ReversibilityClass::Irreversible, "sent messages cannot be recalled")
        .probe(Probe::required(ProbeKind::Permission, "messages"))
        .step(ExecutionStep::read("load_thread"))
        .step(ExecutionStep::mutation("send_message", None))
}

/// Create a reminder: base 30, reversible. Scores 30, tier medium.
#[must_use]
pub fn reminder_builder() -> PlanBuilder {
    PlanBuilder::new()
        .intent(IntentKind::CreateReminder, "Water the plants", "reminders")
        .base_risk(30)
        .reversibility(ReversibilityClass::Reversible, "reminders can be deleted")
        .probe(Probe::required(ProbeKind::Permission, "reminders"))
        .step(ExecutionStep::mutation(
            "create_reminder",
            Some("delete_reminder".to_string()),
        ))
}

/// Summarize a thread: base 5, reversible. Scores 5, tier low.
#[must_use]
pub fn low_risk_builder() -> PlanBuilder {
    PlanBuilder::new()
        .intent(IntentKind::Summarize, "Summarize the thread", "inbox")
        .base_risk(5)
        .reversibility(ReversibilityClass::Reversible, "read only")
        .step(ExecutionStep::read("summarize_thread"))
}

/// Build and sign with [`test_signer`].
#[must_use]
pub fn build_plan(builder: PlanBuilder) -> AuthorizationPlan {
    builder
        .build(&test_signer())
        .expect("fixture builders always set an intent")
}

/// A ledger with an outgoing message and a memory save, neither acknowledged.
#[must_use]
pub fn two_effect_ledger(plan_id: PlanId) -> SideEffectLedger {
    SideEffectLedger::new(plan_id)
        .with_effect(SideEffect::new(SideEffectKind::SendMessage, "Send reply to Sam"))
        .with_effect(SideEffect::new(SideEffectKind::SaveToMemory, "Remember Friday plan"))
}

/// A ledger holding one reminder preview. Returns the effect id too.
#[must_use]
pub fn reminder_preview_ledger(plan_id: PlanId) -> (SideEffectLedger, EffectId) {
    let mut ledger = SideEffectLedger::new(plan_id);
    let id = ledger.push(
        SideEffect::new(SideEffectKind::PreviewReminder, "Water the plants")
            .with_payload("due", "2026-10-20T09:00")
            .with_payload("list", "home"),
    );
    (ledger, id)
}

/// Every permission granted.
#[must_use]
pub fn all_permissions() -> PermissionSnapshot {
    [
        PermissionDomain::Calendar,
        PermissionDomain::Reminders,
        PermissionDomain::Contacts,
        PermissionDomain::Messages,
        PermissionDomain::Notifications,
    ]
    .into_iter()
    .map(|d| (d, true))
    .collect()
}

/// Nothing granted.
#[must_use]
pub fn no_permissions() -> PermissionSnapshot {
    PermissionSnapshot::new()
}
