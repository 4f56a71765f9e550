//! Risk policy: pure mapping from scores to tiers and approval requirements.
//!
//! # Construction Path
//!
//! 1. `final = clamp(base + reversibility.modifier(), 0, 100)`
//! 2. `tier = RiskTier::from_score(final)`
//! 3. `requirement = policy.requirement_for(tier)`
//!
//! Every function here is total over its inputs and has no side effects.

use serde::{Deserialize, Serialize};
use std::fmt;

use keystone_core::RiskTier;

/// Upper bound of the risk score scale.
pub const MAX_RISK_SCORE: u8 = 100;

/// Default cooldown attached to the critical tier.
pub const DEFAULT_CRITICAL_COOLDOWN_SECS: u64 = 30;

/// Whether an action's effects can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversibilityClass {
    /// Fully undoable.
    Reversible,
    /// Partly undoable (e.g. an event can be deleted but invitees were notified).
    PartiallyReversible,
    /// Cannot be undone (e.g. a sent message).
    Irreversible,
}

impl ReversibilityClass {
    /// Additive risk-score penalty for this class.
    #[must_use]
    pub const fn modifier(&self) -> i32 {
        match self {
            Self::Reversible => 0,
            Self::PartiallyReversible => 15,
            Self::Irreversible => 30,
        }
    }

    /// Stable lowercase tag (part of the signed digest).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reversible => "reversible",
            Self::PartiallyReversible => "partially_reversible",
            Self::Irreversible => "irreversible",
        }
    }
}

impl fmt::Display for ReversibilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band lookup from a final score to a tier.
#[must_use]
pub const fn tier_from_score(score: u8) -> RiskTier {
    RiskTier::from_score(score)
}

/// Apply the reversibility modifier to a base score and clamp to `0..=100`.
#[must_use]
pub fn final_score(base: i32, reversibility: ReversibilityClass) -> u8 {
    let raw = base.saturating_add(reversibility.modifier());
    let clamped = raw.clamp(0, i32::from(MAX_RISK_SCORE));
    u8::try_from(clamped).unwrap_or(MAX_RISK_SCORE)
}

/// Which canonical requirement bundle a requirement corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// No human approval needed.
    AutoApprove,
    /// One approval after a mandatory preview.
    PreviewRequired,
    /// One biometric/strong approval after a mandatory preview.
    BiometricRequired,
    /// Two approvals, biometric, cooldown and preview.
    CriticalMultiSig,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApprove => write!(f, "auto-approve"),
            Self::PreviewRequired => write!(f, "preview-required"),
            Self::BiometricRequired => write!(f, "biometric-required"),
            Self::CriticalMultiSig => write!(f, "critical-multi-sig"),
        }
    }
}

/// The human confirmations a plan needs before it may execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    /// Which canonical bundle this is.
    pub kind: RequirementKind,
    /// Number of approval events needed.
    pub approvals_needed: u8,
    /// Whether a biometric/strong confirmation is needed.
    pub requires_biometric: bool,
    /// Minimum wait, in seconds, between the first approval and `Approved`.
    pub cooldown_secs: u64,
    /// Number of distinct signers the approvals must come from.
    pub multi_signer_count: u8,
    /// Whether the preview must have been shown.
    pub preview_required: bool,
}

impl ApprovalRequirement {
    /// No approval needed.
    #[must_use]
    pub const fn auto_approve() -> Self {
        Self {
            kind: RequirementKind::AutoApprove,
            approvals_needed: 0,
            requires_biometric: false,
            cooldown_secs: 0,
            multi_signer_count: 0,
            preview_required: false,
        }
    }

    /// One approval with a mandatory preview.
    #[must_use]
    pub const fn preview_required() -> Self {
        Self {
            kind: RequirementKind::PreviewRequired,
            approvals_needed: 1,
            requires_biometric: false,
            cooldown_secs: 0,
            multi_signer_count: 1,
            preview_required: true,
        }
    }

    /// One biometric approval with a mandatory preview.
    #[must_use]
    pub const fn biometric_required() -> Self {
        Self {
            kind: RequirementKind::BiometricRequired,
            approvals_needed: 1,
            requires_biometric: true,
            cooldown_secs: 0,
            multi_signer_count: 1,
            preview_required: true,
        }
    }

    /// Two approvals, biometric, cooldown and preview.
    #[must_use]
    pub const fn critical_multi_sig() -> Self {
        Self {
            kind: RequirementKind::CriticalMultiSig,
            approvals_needed: 2,
            requires_biometric: true,
            cooldown_secs: DEFAULT_CRITICAL_COOLDOWN_SECS,
            multi_signer_count: 1,
            preview_required: true,
        }
    }

    /// Whether any human approval is needed at all.
    #[must_use]
    pub const fn needs_approval(&self) -> bool {
        self.approvals_needed > 0
    }

    /// Whether this bundle is at least as strict as `floor` in every field.
    #[must_use]
    pub fn satisfies(&self, floor: &ApprovalRequirement) -> bool {
        self.kind == floor.kind
            && self.approvals_needed >= floor.approvals_needed
            && self.multi_signer_count >= floor.multi_signer_count
            && self.cooldown_secs >= floor.cooldown_secs
            && (self.requires_biometric || !floor.requires_biometric)
            && (self.preview_required || !floor.preview_required)
    }
}

/// Canonical requirement for a tier, with default cooldown and signer count.
#[must_use]
pub const fn requirement_from_tier(tier: RiskTier) -> ApprovalRequirement {
    match tier {
        RiskTier::Low => ApprovalRequirement::auto_approve(),
        RiskTier::Medium => ApprovalRequirement::preview_required(),
        RiskTier::High => ApprovalRequirement::biometric_required(),
        RiskTier::Critical => ApprovalRequirement::critical_multi_sig(),
    }
}

/// Deployment-tunable view of the requirement table.
///
/// Only the critical tier's cooldown and signer count are tunable; the tier
/// bands and the shape of each bundle are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Cooldown applied to critical plans.
    pub critical_cooldown_secs: u64,
    /// Distinct signers required for critical plans.
    pub critical_signers: u8,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            critical_cooldown_secs: DEFAULT_CRITICAL_COOLDOWN_SECS,
            critical_signers: 1,
        }
    }
}

impl RiskPolicy {
    /// Set the critical cooldown.
    #[must_use]
    pub fn with_critical_cooldown_secs(mut self, secs: u64) -> Self {
        self.critical_cooldown_secs = secs;
        self
    }

    /// Set the number of distinct signers for critical plans.
    #[must_use]
    pub fn with_critical_signers(mut self, signers: u8) -> Self {
        self.critical_signers = signers.max(1);
        self
    }

    /// Requirement bundle for a tier under this policy.
    #[must_use]
    pub fn requirement_for(&self, tier: RiskTier) -> ApprovalRequirement {
        let mut requirement = requirement_from_tier(tier);
        if tier == RiskTier::Critical {
            requirement.cooldown_secs = self.critical_cooldown_secs;
            requirement.multi_signer_count = self.critical_signers;
        }
        requirement
    }

    /// Run the full construction path for a base score.
    #[must_use]
    pub fn assess(&self, base: i32, reversibility: ReversibilityClass) -> Assessment {
        let score = final_score(base, reversibility);
        let tier = tier_from_score(score);
        Assessment {
            score,
            tier,
            requirement: self.requirement_for(tier),
        }
    }
}

/// Output of [`RiskPolicy::assess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// Clamped final score.
    pub score: u8,
    /// Tier derived from the score.
    pub tier: RiskTier,
    /// Requirement derived from the tier.
    pub requirement: ApprovalRequirement,
}
