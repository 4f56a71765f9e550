//! Approval error types.

use keystone_core::PlanId;

use crate::effect::EffectId;

/// Errors that can occur while building, verifying or confirming a plan.
///
/// Gate denials are not errors: they come back as a
/// [`GateDecision`](crate::gate::GateDecision) with a structured reason.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// The plan's signature does not match its fields.
    #[error("plan {plan_id} failed signature verification; treat as tampered")]
    Tampered {
        /// The plan that failed verification.
        plan_id: PlanId,
    },

    /// The attached approval requirement is weaker than policy demands for
    /// the plan's risk tier.
    #[error("plan {plan_id} carries an approval requirement weaker than its risk tier demands")]
    WeakenedRequirement {
        /// The plan whose requirement was weakened.
        plan_id: PlanId,
    },

    /// A side-effect ledger was presented with a plan it does not belong to.
    #[error("side-effect ledger belongs to plan {ledger_plan}, not {plan_id}")]
    LedgerMismatch {
        /// The plan being evaluated.
        plan_id: PlanId,
        /// The plan the ledger was created for.
        ledger_plan: PlanId,
    },

    /// No side effect with this id exists in the ledger.
    #[error("unknown side effect {0}")]
    UnknownEffect(EffectId),

    /// The requested two-key transition is not valid for this effect.
    #[error("side effect {effect_id} cannot {operation}: {reason}")]
    InvalidTransition {
        /// The effect that was targeted.
        effect_id: EffectId,
        /// The operation attempted.
        operation: &'static str,
        /// Why it was refused.
        reason: String,
    },

    /// A two-key confirm or cancel was issued with no request in flight.
    #[error("no two-key confirmation is pending")]
    NoPendingConfirmation,

    /// A second two-key request was started while one is still in flight.
    #[error("two-key confirmation already pending for {0}")]
    ConfirmationInFlight(EffectId),
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
