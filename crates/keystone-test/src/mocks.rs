//! Mock implementations for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use keystone_approval::{AuthorizationPlan, SideEffectLedger};
use keystone_core::{PlanId, Timestamp};
use keystone_kernel::{EffectStatus, EngineError, ExecutionEngine, ExecutionReport};

/// Execution engine that performs nothing and remembers every call.
///
/// Reports the configured status for each enabled effect, or fails outright
/// when built with [`RecordingEngine::failing`].
#[derive(Debug, Clone)]
pub struct RecordingEngine {
    status: EffectStatus,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<(PlanId, Option<Timestamp>)>>>,
}

impl RecordingEngine {
    /// An engine where every effect succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: EffectStatus::Succeeded,
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An engine that cannot run at all.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Report `status` for every effect.
    #[must_use]
    pub fn with_status(mut self, status: EffectStatus) -> Self {
        self.status = status;
        self
    }

    /// Plans the engine was asked to run, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlanId> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }

    /// Approval timestamps handed to the engine, in order.
    #[must_use]
    pub fn approval_timestamps(&self) -> Vec<Option<Timestamp>> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(_, at)| *at).collect())
            .unwrap_or_default()
    }
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionEngine for RecordingEngine {
    async fn execute(
        &self,
        plan: &AuthorizationPlan,
        ledger: &SideEffectLedger,
        approved_at: Option<Timestamp>,
    ) -> Result<ExecutionReport, EngineError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((plan.id(), approved_at));
        }
        if let Some(reason) = &self.failure {
            return Err(EngineError(reason.clone()));
        }
        Ok(ExecutionReport::from_statuses(
            ledger.enabled().map(|effect| (effect.id(), self.status)),
        ))
    }
}
