//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_approval::prelude::*;` to import all essential types.

// Errors
pub use crate::{ApprovalError, ApprovalResult};

// Risk
pub use crate::{ApprovalRequirement, RequirementKind, ReversibilityClass, RiskPolicy};

// Plans
pub use crate::{AuthorizationPlan, ExecutionStep, IntentKind, PlanBuilder, Probe, ProbeKind};

// Effects & review
pub use crate::{
    ApprovalFlow, ApprovalGate, ApprovalGrant, BlockReason, EffectId, GateDecision, GateState,
    SideEffect, SideEffectKind, SideEffectLedger, TwoKeyRequest,
};
