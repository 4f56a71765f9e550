//! The seam to whatever actually performs side effects.
//!
//! The kernel never mutates anything outside itself. Once the gate allows a
//! plan, the approved plan and its finalized ledger are handed to an
//! [`ExecutionEngine`], which reports per-effect outcomes back for the audit
//! vault.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keystone_approval::{AuthorizationPlan, EffectId, SideEffectLedger};
use keystone_audit::OutcomeType;
use keystone_core::Timestamp;

/// An engine-level failure (the engine could not run at all).
#[derive(Debug, Clone, Error)]
#[error("execution engine failed: {0}")]
pub struct EngineError(pub String);

/// What happened to one effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectStatus {
    /// Performed.
    Succeeded,
    /// Attempted and failed.
    Failed,
    /// Not attempted.
    Skipped,
}

/// Per-effect result reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectOutcome {
    /// Which effect.
    pub effect_id: EffectId,
    /// What happened.
    pub status: EffectStatus,
}

/// Everything an engine reports for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// One entry per effect the engine considered.
    pub outcomes: Vec<EffectOutcome>,
}

impl ExecutionReport {
    /// Build a report from `(effect, status)` pairs.
    pub fn from_statuses(statuses: impl IntoIterator<Item = (EffectId, EffectStatus)>) -> Self {
        Self {
            outcomes: statuses
                .into_iter()
                .map(|(effect_id, status)| EffectOutcome { effect_id, status })
                .collect(),
        }
    }

    /// Number of effects with `status`.
    #[must_use]
    pub fn count(&self, status: EffectStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Content-free outcome for the lineage record.
    ///
    /// Any failure makes the run `Failed`. A run where nothing was performed
    /// is `Cancelled`.
    #[must_use]
    pub fn outcome_type(&self) -> OutcomeType {
        if self.count(EffectStatus::Failed) > 0 {
            OutcomeType::Failed
        } else if self.count(EffectStatus::Succeeded) > 0 || self.outcomes.is_empty() {
            OutcomeType::Executed
        } else {
            OutcomeType::Cancelled
        }
    }
}

/// Performs the effects of an approved plan.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Run `plan` with the enabled effects in `ledger`.
    ///
    /// `approved_at` is the approval timestamp for the engine's own audit
    /// trail.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the engine could not run. Individual
    /// effect failures belong in the report instead.
    async fn execute(
        &self,
        plan: &AuthorizationPlan,
        ledger: &SideEffectLedger,
        approved_at: Option<Timestamp>,
    ) -> Result<ExecutionReport, EngineError>;
}
