//! The authorization kernel: one explicitly constructed owner for the
//! signer, policy, gate, audit vault and manifest stores.
//!
//! A host builds one [`AuthorizationKernel`] at startup and passes it by
//! reference to whatever coordinates a flow. Mutating operations take
//! `&mut self`, so the single-writer rule for the vault and plan manifest is
//! enforced by the borrow checker.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use keystone_approval::{
    ApprovalGate, ApprovalGrant, AuthorizationPlan, GateDecision, GateState, PlanBuilder,
    RequirementKind, RiskPolicy, SideEffectLedger,
};
use keystone_audit::{
    AuditVault, Lineage, OutcomeType, PolicyDecision, PurgeOutcome, VaultConfig, VaultEventKind,
    VaultExport, VaultSnapshot, VaultSummary,
};
use keystone_config::Config;
use keystone_core::{DayStamp, PermissionSnapshot, PlanId, Timestamp};
use keystone_crypto::{PlanSigner, SigningSecret};
use keystone_storage::{LoadSource, ManifestStore};

use crate::engine::{ExecutionEngine, ExecutionReport};
use crate::error::{KernelError, KernelResult};
use crate::keys::{KeySource, resolve_signing_secret};
use crate::lineage::{approved_policy, decision_policy, lineage_for};

/// File name of the plan manifest inside the data directory.
pub const PLANS_FILE: &str = "plans.json";

/// File name of the vault manifest inside the data directory.
pub const VAULT_FILE: &str = "vault.json";

/// Runtime settings, usually derived from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSettings {
    /// Risk policy for new plans and the floor stored plans are checked against.
    pub policy: RiskPolicy,
    /// Vault behavior.
    pub vault: VaultConfig,
    /// Persist the vault after each change.
    pub persist_vault: bool,
    /// Where manifests live. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            policy: RiskPolicy::default(),
            vault: VaultConfig::default(),
            persist_vault: true,
            data_dir: None,
        }
    }
}

impl KernelSettings {
    /// Translate configuration sections into settings.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Config`] if no data directory can be determined.
    pub fn from_config(config: &Config) -> KernelResult<Self> {
        Ok(Self {
            policy: RiskPolicy::default()
                .with_critical_cooldown_secs(config.approval.critical_cooldown_secs)
                .with_critical_signers(config.approval.critical_signers),
            vault: VaultConfig {
                enabled: config.vault.enabled,
                capacity: config.vault.capacity,
                export_recent_limit: config.vault.export_recent_limit,
            },
            persist_vault: config.vault.persist,
            data_dir: Some(config.data_dir()?),
        })
    }

    /// Keep manifests under `dir`.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}

/// What [`AuthorizationKernel::execute`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// The gate decision.
    pub decision: GateDecision,
    /// The engine report, present only if the engine ran.
    pub report: Option<ExecutionReport>,
}

impl ExecutionOutcome {
    /// Whether the engine was invoked.
    #[must_use]
    pub fn executed(&self) -> bool {
        self.report.is_some()
    }
}

/// Composition root for one authorization domain.
#[derive(Debug)]
pub struct AuthorizationKernel {
    signer: Arc<PlanSigner>,
    key_source: KeySource,
    policy: RiskPolicy,
    gate: ApprovalGate,
    vault: AuditVault,
    vault_store: Option<ManifestStore<VaultSnapshot>>,
    plan_store: ManifestStore<AuthorizationPlan>,
    plans: Vec<AuthorizationPlan>,
    edits: HashMap<PlanId, u32>,
    rejected_on_load: usize,
}

impl AuthorizationKernel {
    /// Build a kernel around an injected secret.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Crypto`] if the secret is rejected by the MAC.
    pub fn open(secret: &SigningSecret, settings: KernelSettings) -> KernelResult<Self> {
        Self::assemble(secret, KeySource::Injected, settings)
    }

    /// Build a kernel from configuration and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable signing key is configured or the data
    /// directory cannot be determined.
    pub fn from_config(config: &Config) -> KernelResult<Self> {
        Self::from_config_with_env(config, &keystone_config::env::collect_env_vars())
    }

    /// [`AuthorizationKernel::from_config`] with an explicit environment.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationKernel::from_config`].
    pub fn from_config_with_env<S: BuildHasher>(
        config: &Config,
        env_vars: &HashMap<String, String, S>,
    ) -> KernelResult<Self> {
        let (secret, source) = resolve_signing_secret(&config.signing, env_vars)?;
        Self::assemble(&secret, source, KernelSettings::from_config(config)?)
    }

    fn assemble(
        secret: &SigningSecret,
        key_source: KeySource,
        settings: KernelSettings,
    ) -> KernelResult<Self> {
        let signer = Arc::new(PlanSigner::new(secret)?);
        let gate = ApprovalGate::new(Arc::clone(&signer)).with_policy(settings.policy);

        let (plan_store, vault_store): (
            ManifestStore<AuthorizationPlan>,
            Option<ManifestStore<VaultSnapshot>>,
        ) = match &settings.data_dir {
            Some(dir) => (
                ManifestStore::open(dir.join(PLANS_FILE)),
                settings
                    .persist_vault
                    .then(|| ManifestStore::open(dir.join(VAULT_FILE))),
            ),
            None => (
                ManifestStore::ephemeral("no data directory configured"),
                None,
            ),
        };

        let vault = match &vault_store {
            Some(store) => {
                let mut snapshots = store.load().manifest.items;
                match snapshots.pop() {
                    Some(snapshot) => AuditVault::restore(settings.vault, snapshot),
                    None => AuditVault::new(settings.vault),
                }
            },
            None => AuditVault::new(settings.vault),
        };

        let loaded = plan_store.load();
        let total = loaded.manifest.items.len();
        let plans: Vec<AuthorizationPlan> = loaded
            .manifest
            .items
            .into_iter()
            .filter(|plan| match plan.verify_with_policy(&signer, &settings.policy) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        plan_id = %plan.id(),
                        error = %e,
                        "stored plan failed verification, ignoring"
                    );
                    false
                },
            })
            .collect();
        let rejected_on_load = total.saturating_sub(plans.len());
        if loaded.source == LoadSource::Backup {
            warn!("plan manifest recovered from backup");
        }

        info!(
            key_source = %key_source,
            key_id = %signer.key_id_hex(),
            plans = plans.len(),
            rejected = rejected_on_load,
            vault_events = vault.len(),
            "authorization kernel ready"
        );

        Ok(Self {
            signer,
            key_source,
            policy: settings.policy,
            gate,
            vault,
            vault_store,
            plan_store,
            plans,
            edits: HashMap::new(),
            rejected_on_load,
        })
    }

    /// The plan signer.
    #[must_use]
    pub fn signer(&self) -> &Arc<PlanSigner> {
        &self.signer
    }

    /// Where the signing key came from.
    #[must_use]
    pub fn key_source(&self) -> &KeySource {
        &self.key_source
    }

    /// Risk policy applied to new plans.
    #[must_use]
    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// The approval gate.
    #[must_use]
    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// The audit vault.
    #[must_use]
    pub fn vault(&self) -> &AuditVault {
        &self.vault
    }

    /// Verified stored plans, oldest first.
    #[must_use]
    pub fn plans(&self) -> &[AuthorizationPlan] {
        &self.plans
    }

    /// Stored plans dropped at startup because they failed verification.
    #[must_use]
    pub fn rejected_on_load(&self) -> usize {
        self.rejected_on_load
    }

    /// Why persistence is unavailable, if it is.
    #[must_use]
    pub fn storage_warning(&self) -> Option<String> {
        self.plan_store
            .warning()
            .or_else(|| self.vault_store.as_ref().and_then(ManifestStore::warning))
            .map(|reason| format!("storage unavailable, running in-memory only: {reason}"))
    }

    /// Build, sign and store a plan under this kernel's policy.
    ///
    /// Returns `None` if the builder has no intent.
    pub fn propose(&mut self, builder: PlanBuilder) -> Option<AuthorizationPlan> {
        let plan = builder.with_policy(self.policy).build(&self.signer)?;
        info!(
            plan_id = %plan.id(),
            intent = plan.intent().kind.as_str(),
            score = plan.risk_score(),
            tier = %plan.tier(),
            requirement = %plan.requirement().kind,
            "plan proposed"
        );

        let lineage = self.draft_lineage(&plan);
        self.record(DayStamp::today(), VaultEventKind::PlanCreated, Some(lineage));

        self.plans.push(plan.clone());
        self.persist_plans();
        Some(plan)
    }

    /// Verify a plan's integrity, including that its attached requirement
    /// is no weaker than the kernel's policy demands for its tier.
    ///
    /// A failing plan is recorded as a denied verification.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Approval`] wrapping `Tampered` on a signature
    /// mismatch or `WeakenedRequirement` on a weakened requirement.
    pub fn verify(&mut self, plan: &AuthorizationPlan) -> KernelResult<()> {
        match plan.verify_with_policy(&self.signer, &self.policy) {
            Ok(()) => {
                debug!(plan_id = %plan.id(), "plan verified");
                self.record(DayStamp::today(), VaultEventKind::AuthorizationVerified, None);
                Ok(())
            },
            Err(e) => {
                warn!(plan_id = %plan.id(), error = %e, "plan failed verification");
                let lineage = lineage_for(
                    plan,
                    OutcomeType::Denied,
                    PolicyDecision::Denied,
                    self.edit_count(plan.id()),
                    DayStamp::today(),
                );
                self.record(
                    DayStamp::today(),
                    VaultEventKind::AuthorizationVerified,
                    Some(lineage),
                );
                Err(e.into())
            },
        }
    }

    /// Run the gate at `now`.
    ///
    /// Allowed and denied decisions are recorded in the vault; a plan still
    /// pending review is not, since callers poll it repeatedly.
    pub fn authorize(
        &mut self,
        plan: &AuthorizationPlan,
        grant: &ApprovalGrant,
        ledger: &SideEffectLedger,
        permissions: &PermissionSnapshot,
        now: Timestamp,
    ) -> GateDecision {
        let decision = self.gate.can_execute(plan, grant, ledger, permissions, now);
        if decision.allow || decision.state == GateState::Denied {
            let outcome = if decision.allow {
                OutcomeType::Approved
            } else {
                OutcomeType::Denied
            };
            let lineage = lineage_for(
                plan,
                outcome,
                decision_policy(plan, ledger, &decision),
                self.edit_count(plan.id()),
                now.day(),
            );
            self.record(now.day(), VaultEventKind::AuthorizationVerified, Some(lineage));
        }
        info!(
            plan_id = %plan.id(),
            state = %decision.state,
            allow = decision.allow,
            "authorization evaluated"
        );
        decision
    }

    /// Authorize and, if allowed, hand the plan to `engine`.
    ///
    /// The engine's per-effect report is recorded as a content-free
    /// execution event. The engine is never called for a plan the gate
    /// did not allow. Once the engine has reported, the plan is dropped
    /// from the store; after an engine error it stays so it can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Engine`] if the engine could not run. The
    /// failure is recorded before returning.
    pub async fn execute<E>(
        &mut self,
        engine: &E,
        plan: &AuthorizationPlan,
        grant: &ApprovalGrant,
        ledger: &SideEffectLedger,
        permissions: &PermissionSnapshot,
        now: Timestamp,
    ) -> KernelResult<ExecutionOutcome>
    where
        E: ExecutionEngine + ?Sized,
    {
        let decision = self.authorize(plan, grant, ledger, permissions, now);
        if !decision.allow {
            return Ok(ExecutionOutcome {
                decision,
                report: None,
            });
        }

        let policy = approved_policy(plan, ledger);
        let edits = self.edit_count(plan.id());
        match engine.execute(plan, ledger, grant.granted_at()).await {
            Ok(report) => {
                let outcome = report.outcome_type();
                info!(
                    plan_id = %plan.id(),
                    outcome = %outcome,
                    effects = report.outcomes.len(),
                    "execution recorded"
                );
                let lineage = lineage_for(plan, outcome, policy, edits, now.day());
                self.record(now.day(), VaultEventKind::ExecutionRecorded, Some(lineage));
                self.retire_plan(plan.id());
                Ok(ExecutionOutcome {
                    decision,
                    report: Some(report),
                })
            },
            Err(e) => {
                warn!(plan_id = %plan.id(), error = %e, "execution engine failed");
                let lineage = lineage_for(plan, OutcomeType::Failed, policy, edits, now.day());
                self.record(now.day(), VaultEventKind::ExecutionRecorded, Some(lineage));
                Err(e.into())
            },
        }
    }

    /// Record that the draft behind `plan` was edited. Returns the new edit
    /// count.
    pub fn record_edit(&mut self, plan: &AuthorizationPlan) -> u32 {
        let count = self.edits.entry(plan.id()).or_insert(0);
        *count = count.saturating_add(1);
        let edits = *count;
        let lineage = self.draft_lineage(plan);
        self.record(DayStamp::today(), VaultEventKind::PlanEdited, Some(lineage));
        edits
    }

    /// Record that `plan` was exported.
    pub fn record_export(&mut self, plan: &AuthorizationPlan) {
        let lineage = self.draft_lineage(plan);
        self.record(DayStamp::today(), VaultEventKind::PlanExported, Some(lineage));
    }

    /// Look up a stored plan and re-verify it.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::PlanNotFound`] or a tamper error.
    pub fn load_plan(&self, id: PlanId) -> KernelResult<&AuthorizationPlan> {
        let plan = self
            .plans
            .iter()
            .find(|p| p.id() == id)
            .ok_or(KernelError::PlanNotFound(id))?;
        plan.verify_with_policy(&self.signer, &self.policy)?;
        Ok(plan)
    }

    /// Remove a stored plan (after execution or cancellation).
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::PlanNotFound`] if no such plan is stored.
    pub fn discard_plan(&mut self, id: PlanId) -> KernelResult<AuthorizationPlan> {
        let index = self
            .plans
            .iter()
            .position(|p| p.id() == id)
            .ok_or(KernelError::PlanNotFound(id))?;
        let plan = self.plans.remove(index);
        self.edits.remove(&id);
        self.persist_plans();
        debug!(plan_id = %id, "plan discarded");
        Ok(plan)
    }

    /// Summarize the vault as of today.
    #[must_use]
    pub fn vault_summary(&self) -> VaultSummary {
        self.vault.summarize()
    }

    /// Produce a validated vault export.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Audit`] if the vault is disabled or the export
    /// fails its content scan.
    pub fn export_vault(&self) -> KernelResult<VaultExport> {
        Ok(self.vault.export_summary()?)
    }

    /// Purge the vault.
    pub fn purge_vault(&mut self, confirmed: bool) -> PurgeOutcome {
        let outcome = self.vault.purge(confirmed);
        if matches!(outcome, PurgeOutcome::Success(_)) {
            self.persist_vault();
        }
        outcome
    }

    fn retire_plan(&mut self, id: PlanId) {
        self.edits.remove(&id);
        if let Some(index) = self.plans.iter().position(|p| p.id() == id) {
            self.plans.remove(index);
            self.persist_plans();
            debug!(plan_id = %id, "executed plan retired");
        }
    }

    fn edit_count(&self, id: PlanId) -> u32 {
        self.edits.get(&id).copied().unwrap_or(0)
    }

    fn draft_lineage(&self, plan: &AuthorizationPlan) -> Lineage {
        let policy = if plan.requirement().kind == RequirementKind::AutoApprove {
            PolicyDecision::AutoApproved
        } else {
            PolicyDecision::Blocked
        };
        lineage_for(
            plan,
            OutcomeType::Drafted,
            policy,
            self.edit_count(plan.id()),
            DayStamp::today(),
        )
    }

    fn record(&mut self, day: DayStamp, kind: VaultEventKind, lineage: Option<Lineage>) {
        if self.vault.append_on(day, kind, lineage).is_some() {
            self.persist_vault();
        }
    }

    fn persist_vault(&mut self) {
        let snapshot = self.vault.snapshot();
        if let Some(store) = &mut self.vault_store {
            if let Err(e) = store.save(&[snapshot]) {
                warn!(
                    error = %e,
                    "failed to persist audit vault; in-memory vault remains authoritative"
                );
            }
        }
    }

    fn persist_plans(&mut self) {
        if let Err(e) = self.plan_store.save(&self.plans) {
            warn!(error = %e, plans = self.plans.len(), "failed to persist plan manifest");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EffectStatus, EngineError};
    use async_trait::async_trait;
    use keystone_approval::{
        ApprovalError, IntentKind, ReversibilityClass, SideEffect, SideEffectKind,
    };
    use keystone_core::PermissionDomain;
    use keystone_test::fixtures::{send_message_builder, test_secret};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Reports `status` for every enabled effect and remembers each call.
    struct StubEngine {
        status: EffectStatus,
        fail: bool,
        calls: Mutex<Vec<PlanId>>,
    }

    impl StubEngine {
        fn new(status: EffectStatus) -> Self {
            Self {
                status,
                fail: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(EffectStatus::Succeeded)
            }
        }

        fn calls(&self) -> Vec<PlanId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionEngine for StubEngine {
        async fn execute(
            &self,
            plan: &AuthorizationPlan,
            ledger: &SideEffectLedger,
            _approved_at: Option<Timestamp>,
        ) -> Result<ExecutionReport, EngineError> {
            self.calls.lock().unwrap().push(plan.id());
            if self.fail {
                return Err(EngineError("backend offline".into()));
            }
            Ok(ExecutionReport::from_statuses(
                ledger.enabled().map(|e| (e.id(), self.status)),
            ))
        }
    }

    fn kernel_in(dir: &TempDir) -> AuthorizationKernel {
        AuthorizationKernel::open(
            &test_secret(),
            KernelSettings::default().with_data_dir(dir.path()),
        )
        .unwrap()
    }

    fn low_risk_builder() -> PlanBuilder {
        PlanBuilder::new()
            .intent(IntentKind::Summarize, "Summarize thread", "inbox")
            .base_risk(5)
            .reversibility(ReversibilityClass::Reversible, "read only")
    }

    #[test]
    fn test_propose_records_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(send_message_builder()).unwrap();

        assert_eq!(kernel.plans().len(), 1);
        assert_eq!(kernel.vault().len(), 1);
        let event = kernel.vault().events().next().unwrap();
        assert_eq!(event.kind, VaultEventKind::PlanCreated);
        assert_eq!(event.lineage.as_ref().unwrap().outcome, OutcomeType::Drafted);

        let reopened = kernel_in(&dir);
        assert_eq!(reopened.plans().len(), 1);
        assert_eq!(reopened.load_plan(plan.id()).unwrap(), &plan);
        assert_eq!(reopened.vault().len(), 1);
        assert!(reopened.storage_warning().is_none());
    }

    #[test]
    fn test_propose_without_intent() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        assert!(kernel.propose(PlanBuilder::new().base_risk(10)).is_none());
        assert!(kernel.vault().is_empty());
    }

    #[test]
    fn test_plans_from_other_key_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        {
            let mut kernel = kernel_in(&dir);
            kernel.propose(send_message_builder()).unwrap();
        }
        let other = AuthorizationKernel::open(
            &SigningSecret::generate(),
            KernelSettings::default().with_data_dir(dir.path()),
        )
        .unwrap();
        assert!(other.plans().is_empty());
        assert_eq!(other.rejected_on_load(), 1);
    }

    #[test]
    fn test_weakened_cooldown_rejected() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(send_message_builder()).unwrap();

        let mut json = serde_json::to_value(&plan).unwrap();
        json["requirement"]["cooldown_secs"] = serde_json::json!(0);
        let stripped: AuthorizationPlan = serde_json::from_value(json).unwrap();
        assert!(stripped.verify(kernel.signer()).is_ok());

        let err = kernel.verify(&stripped).unwrap_err();
        assert!(matches!(
            err,
            KernelError::Approval(ApprovalError::WeakenedRequirement { .. })
        ));
        assert!(kernel.verify(&plan).is_ok());
    }

    #[test]
    fn test_stored_plans_checked_against_configured_policy() {
        let dir = TempDir::new().unwrap();
        {
            let mut kernel = kernel_in(&dir);
            kernel.propose(send_message_builder()).unwrap();
            kernel.propose(low_risk_builder()).unwrap();
        }

        let mut settings = KernelSettings::default().with_data_dir(dir.path());
        settings.policy = RiskPolicy::default().with_critical_signers(2);
        let strict = AuthorizationKernel::open(&test_secret(), settings).unwrap();
        assert_eq!(strict.plans().len(), 1);
        assert_eq!(strict.rejected_on_load(), 1);
    }

    #[test]
    fn test_in_memory_kernel_warns() {
        let kernel = AuthorizationKernel::open(&test_secret(), KernelSettings::default()).unwrap();
        assert!(kernel.storage_warning().unwrap().contains("in-memory"));
    }

    #[test]
    fn test_edit_count_flows_into_lineage() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(low_risk_builder()).unwrap();
        assert_eq!(kernel.record_edit(&plan), 1);
        assert_eq!(kernel.record_edit(&plan), 2);
        kernel.record_export(&plan);

        let summary = kernel.vault_summary();
        assert_eq!(summary.edit_count, 2);
        assert_eq!(summary.export_count, 1);
        let last = kernel.vault().events().last().unwrap();
        assert_eq!(last.lineage.as_ref().unwrap().edit_count, 2);
    }

    #[tokio::test]
    async fn test_execute_low_risk_runs_engine() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(low_risk_builder()).unwrap();
        let ledger = SideEffectLedger::new(plan.id());
        let engine = StubEngine::new(EffectStatus::Succeeded);

        let outcome = kernel
            .execute(
                &engine,
                &plan,
                &ApprovalGrant::new(),
                &ledger,
                &PermissionSnapshot::new(),
                Timestamp::now(),
            )
            .await
            .unwrap();

        assert!(outcome.executed());
        assert_eq!(engine.calls(), vec![plan.id()]);
        assert!(kernel.plans().is_empty());
        assert!(kernel_in(&dir).plans().is_empty());
        let kinds: Vec<_> = kernel.vault().events().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                VaultEventKind::PlanCreated,
                VaultEventKind::AuthorizationVerified,
                VaultEventKind::ExecutionRecorded,
            ]
        );
    }

    #[tokio::test]
    async fn test_blocked_plan_never_reaches_engine() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(send_message_builder()).unwrap();
        let ledger = SideEffectLedger::new(plan.id()).with_effect(
            SideEffect::new(SideEffectKind::SendMessage, "Send")
                .with_permission(Some(PermissionDomain::Messages)),
        );
        let engine = StubEngine::new(EffectStatus::Succeeded);

        let outcome = kernel
            .execute(
                &engine,
                &plan,
                &ApprovalGrant::new(),
                &ledger,
                &PermissionSnapshot::new(),
                Timestamp::now(),
            )
            .await
            .unwrap();

        assert!(!outcome.executed());
        assert!(!outcome.decision.allow);
        assert!(engine.calls().is_empty());
        assert_eq!(kernel.vault().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_failure_recorded() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(low_risk_builder()).unwrap();
        let ledger = SideEffectLedger::new(plan.id());
        let engine = StubEngine::failing();

        let err = kernel
            .execute(
                &engine,
                &plan,
                &ApprovalGrant::new(),
                &ledger,
                &PermissionSnapshot::new(),
                Timestamp::now(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, KernelError::Engine(_)));
        let last = kernel.vault().events().last().unwrap();
        assert_eq!(last.kind, VaultEventKind::ExecutionRecorded);
        assert_eq!(last.lineage.as_ref().unwrap().outcome, OutcomeType::Failed);
        assert!(kernel.load_plan(plan.id()).is_ok());
        assert_eq!(kernel_in(&dir).plans().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_report() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(low_risk_builder()).unwrap();
        let mut ledger = SideEffectLedger::new(plan.id())
            .with_effect(SideEffect::new(SideEffectKind::SaveToMemory, "Save"));
        ledger.acknowledge_all();
        let engine = StubEngine::new(EffectStatus::Failed);

        let outcome = kernel
            .execute(
                &engine,
                &plan,
                &ApprovalGrant::new(),
                &ledger,
                &PermissionSnapshot::new(),
                Timestamp::now(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.unwrap().count(EffectStatus::Failed), 1);
        let last = kernel.vault().events().last().unwrap();
        assert_eq!(last.lineage.as_ref().unwrap().outcome, OutcomeType::Failed);
    }

    #[test]
    fn test_discard_plan() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        let plan = kernel.propose(low_risk_builder()).unwrap();
        kernel.discard_plan(plan.id()).unwrap();
        assert!(matches!(
            kernel.load_plan(plan.id()),
            Err(KernelError::PlanNotFound(_))
        ));
        assert!(kernel_in(&dir).plans().is_empty());
    }

    #[test]
    fn test_purge_persists() {
        let dir = TempDir::new().unwrap();
        let mut kernel = kernel_in(&dir);
        kernel.propose(low_risk_builder()).unwrap();
        kernel.propose(low_risk_builder()).unwrap();

        assert_eq!(kernel.purge_vault(false), PurgeOutcome::RequiresConfirmation);
        assert_eq!(kernel.purge_vault(true), PurgeOutcome::Success(2));

        let reopened = kernel_in(&dir);
        assert_eq!(reopened.vault().len(), 1);
        assert_eq!(
            reopened.vault().events().next().unwrap().kind,
            VaultEventKind::VaultPurged
        );
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.approval.critical_cooldown_secs = 5;
        config.vault.capacity = 10;
        config.vault.export_recent_limit = 3;
        config.storage.data_dir = Some(PathBuf::from("/tmp/keystone-test"));

        let settings = KernelSettings::from_config(&config).unwrap();
        assert_eq!(settings.policy.critical_cooldown_secs, 5);
        assert_eq!(settings.vault.capacity, 10);
        assert_eq!(settings.data_dir, Some(PathBuf::from("/tmp/keystone-test")));
    }
}
