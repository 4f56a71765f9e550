//! Signed authorization plans.
//!
//! An [`AuthorizationPlan`] is the immutable artifact a proposed action must
//! produce before anything may execute. It is built once through
//! [`PlanBuilder`], signed with a [`PlanSigner`], and never mutated: fields
//! are private and only exposed through getters.
//!
//! # Signed Digest
//!
//! The signature covers, in order and pipe-delimited:
//!
//! ```text
//! id|intentType|riskScore|reversibility|timestamp
//! ```
//!
//! where `timestamp` is the signing instant in Unix milliseconds. Changing any
//! of those fields invalidates the signature. Every consumer must call
//! [`AuthorizationPlan::verify`] and treat a failure as fatal for the plan.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use keystone_core::{PlanId, RiskTier, Timestamp};
use keystone_crypto::{PlanSignature, PlanSigner};

use crate::error::{ApprovalError, ApprovalResult};
use crate::risk::{ApprovalRequirement, ReversibilityClass, RiskPolicy};

/// Closed set of intents the drafting subsystem can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Send a new message.
    SendMessage,
    /// Reply within an existing conversation.
    ReplyMessage,
    /// Create a reminder.
    CreateReminder,
    /// Schedule a new calendar event.
    ScheduleEvent,
    /// Change an existing calendar event.
    UpdateEvent,
    /// Store an item in the assistant's memory.
    SaveMemory,
    /// Produce a summary with no external effect.
    Summarize,
}

impl IntentKind {
    /// Stable tag (part of the signed digest).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::ReplyMessage => "reply_message",
            Self::CreateReminder => "create_reminder",
            Self::ScheduleEvent => "schedule_event",
            Self::UpdateEvent => "update_event",
            Self::SaveMemory => "save_memory",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the plan is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent type tag.
    pub kind: IntentKind,
    /// Human summary shown during review.
    pub summary: String,
    /// Description of the target (recipient, calendar, list...).
    pub target: String,
}

impl Intent {
    /// Create a new intent.
    #[must_use]
    pub fn new(kind: IntentKind, summary: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            target: target.into(),
        }
    }
}

/// Kind of precondition a probe checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// A permission domain must be granted.
    Permission,
    /// A target must exist (contact, calendar, list).
    Existence,
    /// A dependency must be healthy.
    Health,
}

/// A declared precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// What kind of check.
    pub kind: ProbeKind,
    /// What is checked.
    pub target: String,
    /// Whether failure blocks execution.
    pub required: bool,
}

impl Probe {
    /// A probe whose failure blocks execution.
    #[must_use]
    pub fn required(kind: ProbeKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            required: true,
        }
    }

    /// An advisory probe.
    #[must_use]
    pub fn optional(kind: ProbeKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            required: false,
        }
    }
}

/// One ordered step the execution engine will run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Action name.
    pub action: String,
    /// Whether the step changes external state.
    pub mutates_state: bool,
    /// Action that undoes this step, if any.
    pub rollback: Option<String>,
}

impl ExecutionStep {
    /// A step with no external state change.
    #[must_use]
    pub fn read(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            mutates_state: false,
            rollback: None,
        }
    }

    /// A state-changing step with an optional rollback.
    #[must_use]
    pub fn mutation(action: impl Into<String>, rollback: Option<String>) -> Self {
        Self {
            action: action.into(),
            mutates_state: true,
            rollback,
        }
    }
}

/// The signed, immutable authorization artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPlan {
    id: PlanId,
    created_at: Timestamp,
    intent: Intent,
    risk_score: u8,
    risk_reasons: Vec<String>,
    reversibility: ReversibilityClass,
    reversibility_reason: Option<String>,
    requirement: ApprovalRequirement,
    probes: Vec<Probe>,
    steps: Vec<ExecutionStep>,
    signature: PlanSignature,
    signed_at: Timestamp,
}

impl AuthorizationPlan {
    /// Plan identifier.
    #[must_use]
    pub fn id(&self) -> PlanId {
        self.id
    }

    /// When the plan was built.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// The intent.
    #[must_use]
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Final clamped risk score.
    #[must_use]
    pub fn risk_score(&self) -> u8 {
        self.risk_score
    }

    /// Risk tier, always derived from the score.
    #[must_use]
    pub fn tier(&self) -> RiskTier {
        RiskTier::from_score(self.risk_score)
    }

    /// Human-readable risk reasons.
    #[must_use]
    pub fn risk_reasons(&self) -> &[String] {
        &self.risk_reasons
    }

    /// Reversibility classification.
    #[must_use]
    pub fn reversibility(&self) -> ReversibilityClass {
        self.reversibility
    }

    /// Why the action was classified that way.
    #[must_use]
    pub fn reversibility_reason(&self) -> Option<&str> {
        self.reversibility_reason.as_deref()
    }

    /// Attached approval requirement.
    #[must_use]
    pub fn requirement(&self) -> &ApprovalRequirement {
        &self.requirement
    }

    /// Declared preconditions, in order.
    #[must_use]
    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Declared execution steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// Steps that change external state.
    pub fn mutating_steps(&self) -> impl Iterator<Item = &ExecutionStep> {
        self.steps.iter().filter(|s| s.mutates_state)
    }

    /// The signature.
    #[must_use]
    pub fn signature(&self) -> &PlanSignature {
        &self.signature
    }

    /// When the plan was signed.
    #[must_use]
    pub fn signed_at(&self) -> Timestamp {
        self.signed_at
    }

    /// The exact string the signature covers.
    #[must_use]
    pub fn signing_payload(&self) -> String {
        signing_payload(
            self.id,
            self.intent.kind,
            self.risk_score,
            self.reversibility,
            self.signed_at,
        )
    }

    /// Recompute the digest and compare.
    #[must_use]
    pub fn verify_signature(&self, signer: &PlanSigner) -> bool {
        signer.verify(self.signing_payload().as_bytes(), &self.signature)
    }

    /// Verify the signature, returning [`ApprovalError::Tampered`] on mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Tampered`] if the signature does not match.
    pub fn verify(&self, signer: &PlanSigner) -> ApprovalResult<()> {
        if self.verify_signature(signer) {
            Ok(())
        } else {
            warn!(plan_id = %self.id, "plan signature mismatch");
            Err(ApprovalError::Tampered { plan_id: self.id })
        }
    }

    /// Whether the attached requirement is at least as strict as what
    /// `policy` demands for the plan's tier, cooldown included.
    ///
    /// The requirement is not part of the signed digest, so consumers check
    /// it against the (signed) score instead of trusting it.
    #[must_use]
    pub fn requirement_satisfies(&self, policy: &RiskPolicy) -> bool {
        self.requirement
            .satisfies(&policy.requirement_for(self.tier()))
    }

    /// [`AuthorizationPlan::verify`] plus the requirement check against
    /// `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Tampered`] on a signature mismatch, or
    /// [`ApprovalError::WeakenedRequirement`] if the attached requirement is
    /// weaker than the policy's bundle for the plan's tier.
    pub fn verify_with_policy(
        &self,
        signer: &PlanSigner,
        policy: &RiskPolicy,
    ) -> ApprovalResult<()> {
        self.verify(signer)?;
        if self.requirement_satisfies(policy) {
            Ok(())
        } else {
            warn!(plan_id = %self.id, tier = %self.tier(), "plan requirement weakened");
            Err(ApprovalError::WeakenedRequirement { plan_id: self.id })
        }
    }
}

fn signing_payload(
    id: PlanId,
    intent: IntentKind,
    risk_score: u8,
    reversibility: ReversibilityClass,
    signed_at: Timestamp,
) -> String {
    format!(
        "{id}|{intent}|{risk_score}|{reversibility}|{}",
        signed_at.millis()
    )
}

/// Accumulates plan inputs, then signs once in [`PlanBuilder::build`].
///
/// # Example
///
/// ```
/// use keystone_approval::plan::{IntentKind, PlanBuilder};
/// use keystone_approval::risk::ReversibilityClass;
/// use keystone_core::RiskTier;
/// use keystone_crypto::{PlanSigner, SigningSecret};
///
/// let signer = PlanSigner::new(&SigningSecret::generate()).unwrap();
/// let plan = PlanBuilder::new()
///     .intent(IntentKind::SendMessage, "Tell Sam I'm late", "Sam")
///     .base_risk(60)
///     .reversibility(ReversibilityClass::Irreversible, "messages cannot be unsent")
///     .build(&signer)
///     .unwrap();
///
/// assert_eq!(plan.risk_score(), 90);
/// assert_eq!(plan.tier(), RiskTier::Critical);
/// assert!(plan.verify_signature(&signer));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    policy: RiskPolicy,
    intent: Option<Intent>,
    base_score: i32,
    reasons: Vec<String>,
    reversibility: Option<ReversibilityClass>,
    reversibility_reason: Option<String>,
    probes: Vec<Probe>,
    steps: Vec<ExecutionStep>,
}

impl PlanBuilder {
    /// Start an empty builder with the default risk policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific risk policy for requirement selection.
    #[must_use]
    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the intent.
    #[must_use]
    pub fn intent(
        mut self,
        kind: IntentKind,
        summary: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.intent = Some(Intent::new(kind, summary, target));
        self
    }

    /// Set the base risk score (before the reversibility modifier).
    #[must_use]
    pub fn base_risk(mut self, score: i32) -> Self {
        self.base_score = score;
        self
    }

    /// Add a human-readable risk reason.
    #[must_use]
    pub fn risk_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Set the reversibility judgment.
    #[must_use]
    pub fn reversibility(mut self, class: ReversibilityClass, reason: impl Into<String>) -> Self {
        self.reversibility = Some(class);
        self.reversibility_reason = Some(reason.into());
        self
    }

    /// Append a precondition.
    #[must_use]
    pub fn probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Append an execution step.
    #[must_use]
    pub fn step(mut self, step: ExecutionStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Assess, sign and freeze the plan.
    ///
    /// Returns `None` if no intent was supplied. A missing reversibility
    /// judgment is treated as [`ReversibilityClass::Irreversible`].
    #[must_use]
    pub fn build(self, signer: &PlanSigner) -> Option<AuthorizationPlan> {
        let Some(intent) = self.intent else {
            debug!("plan build skipped: no intent");
            return None;
        };

        let reversibility = self
            .reversibility
            .unwrap_or(ReversibilityClass::Irreversible);
        let assessment = self.policy.assess(self.base_score, reversibility);

        let id = PlanId::new();
        let created_at = Timestamp::now();
        let signed_at = Timestamp::now();
        let signature = signer.sign(
            signing_payload(id, intent.kind, assessment.score, reversibility, signed_at)
                .as_bytes(),
        );

        debug!(
            plan_id = %id,
            intent = %intent.kind,
            score = assessment.score,
            tier = %assessment.tier,
            requirement = %assessment.requirement.kind,
            "plan signed"
        );

        Some(AuthorizationPlan {
            id,
            created_at,
            intent,
            risk_score: assessment.score,
            risk_reasons: self.reasons,
            reversibility,
            reversibility_reason: self.reversibility_reason,
            requirement: assessment.requirement,
            probes: self.probes,
            steps: self.steps,
            signature,
            signed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RequirementKind;
    use keystone_crypto::SigningSecret;

    fn signer() -> PlanSigner {
        PlanSigner::new(&SigningSecret::from_bytes(&[42u8; 32]).unwrap()).unwrap()
    }

    fn plan(signer: &PlanSigner) -> AuthorizationPlan {
        PlanBuilder::new()
            .intent(IntentKind::ScheduleEvent, "Lunch with Ana", "Work calendar")
            .base_risk(30)
            .risk_reason("writes to a shared calendar")
            .reversibility(ReversibilityClass::PartiallyReversible, "invitees get notified")
            .probe(Probe::required(ProbeKind::Permission, "calendar"))
            .step(ExecutionStep::read("resolve_calendar"))
            .step(ExecutionStep::mutation(
                "create_event",
                Some("delete_event".to_string()),
            ))
            .build(signer)
            .unwrap()
    }

    #[test]
    fn test_build_requires_intent() {
        assert!(PlanBuilder::new().base_risk(10).build(&signer()).is_none());
    }

    #[test]
    fn test_fresh_plan_verifies() {
        let s = signer();
        let p = plan(&s);
        assert!(p.verify_signature(&s));
        assert!(p.verify(&s).is_ok());
        assert_eq!(p.risk_score(), 45);
        assert_eq!(p.tier(), RiskTier::Medium);
        assert_eq!(p.requirement().kind, RequirementKind::PreviewRequired);
        assert!(p.requirement_satisfies(&RiskPolicy::default()));
        assert_eq!(p.mutating_steps().count(), 1);
    }

    #[test]
    fn test_other_key_rejects() {
        let p = plan(&signer());
        let other = PlanSigner::new(&SigningSecret::from_bytes(&[7u8; 32]).unwrap()).unwrap();
        assert!(!p.verify_signature(&other));
    }

    #[test]
    fn test_tamper_id() {
        let s = signer();
        let mut p = plan(&s);
        p.id = PlanId::new();
        assert!(matches!(p.verify(&s), Err(ApprovalError::Tampered { .. })));
    }

    #[test]
    fn test_tamper_intent_type() {
        let s = signer();
        let mut p = plan(&s);
        p.intent.kind = IntentKind::Summarize;
        assert!(!p.verify_signature(&s));
    }

    #[test]
    fn test_tamper_risk_score() {
        let s = signer();
        let mut p = plan(&s);
        p.risk_score = 5;
        assert!(!p.verify_signature(&s));
    }

    #[test]
    fn test_tamper_reversibility() {
        let s = signer();
        let mut p = plan(&s);
        p.reversibility = ReversibilityClass::Reversible;
        assert!(!p.verify_signature(&s));
    }

    #[test]
    fn test_tamper_signed_at() {
        let s = signer();
        let mut p = plan(&s);
        p.signed_at = Timestamp::from_millis(p.signed_at.millis().saturating_add(1)).unwrap();
        assert!(!p.verify_signature(&s));
    }

    #[test]
    fn test_weakened_requirement_detected() {
        let s = signer();
        let mut p = plan(&s);
        p.requirement = ApprovalRequirement::auto_approve();
        assert!(p.verify_signature(&s));
        assert!(!p.requirement_satisfies(&RiskPolicy::default()));
        assert!(matches!(
            p.verify_with_policy(&s, &RiskPolicy::default()),
            Err(ApprovalError::WeakenedRequirement { .. })
        ));
    }

    fn critical_plan(signer: &PlanSigner, policy: RiskPolicy) -> AuthorizationPlan {
        PlanBuilder::new()
            .with_policy(policy)
            .intent(IntentKind::SendMessage, "Running late", "sam")
            .base_risk(60)
            .reversibility(ReversibilityClass::Irreversible, "cannot unsend")
            .build(signer)
            .unwrap()
    }

    #[test]
    fn test_stripped_cooldown_detected() {
        let s = signer();
        let mut p = critical_plan(&s, RiskPolicy::default());
        assert!(p.verify_with_policy(&s, &RiskPolicy::default()).is_ok());

        p.requirement.cooldown_secs = 0;
        assert!(p.verify_signature(&s));
        assert!(!p.requirement_satisfies(&RiskPolicy::default()));
    }

    #[test]
    fn test_requirement_checked_against_configured_policy() {
        let s = signer();
        let strict = RiskPolicy::default().with_critical_signers(3);

        let lax = critical_plan(&s, RiskPolicy::default());
        assert!(lax.requirement_satisfies(&RiskPolicy::default()));
        assert!(!lax.requirement_satisfies(&strict));

        assert!(critical_plan(&s, strict).requirement_satisfies(&strict));
    }

    #[test]
    fn test_payload_format() {
        let s = signer();
        let p = plan(&s);
        let payload = p.signing_payload();
        let parts: Vec<&str> = payload.split('|').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], p.id().to_string());
        assert_eq!(parts[1], "schedule_event");
        assert_eq!(parts[2], "45");
        assert_eq!(parts[3], "partially_reversible");
        assert_eq!(parts[4], p.signed_at().millis().to_string());
    }

    #[test]
    fn test_json_roundtrip_still_verifies() {
        let s = signer();
        let p = plan(&s);
        let json = serde_json::to_string(&p).unwrap();
        let decoded: AuthorizationPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, p);
        assert!(decoded.verify_signature(&s));
    }

    #[test]
    fn test_missing_reversibility_is_conservative() {
        let s = signer();
        let p = PlanBuilder::new()
            .intent(IntentKind::SaveMemory, "remember parking spot", "memory")
            .base_risk(0)
            .build(&s)
            .unwrap();
        assert_eq!(p.reversibility(), ReversibilityClass::Irreversible);
        assert_eq!(p.risk_score(), 30);
    }

    #[test]
    fn test_critical_end_to_end() {
        let s = signer();
        let p = PlanBuilder::new()
            .intent(IntentKind::SendMessage, "send message", "Jordan")
            .base_risk(60)
            .reversibility(ReversibilityClass::Irreversible, "cannot unsend")
            .build(&s)
            .unwrap();
        assert_eq!(p.risk_score(), 90);
        assert_eq!(p.tier(), RiskTier::Critical);
        let r = p.requirement();
        assert_eq!(r.kind, RequirementKind::CriticalMultiSig);
        assert_eq!(r.approvals_needed, 2);
        assert!(r.requires_biometric);
        assert!(r.cooldown_secs > 0);
        assert!(r.preview_required);
    }
}
