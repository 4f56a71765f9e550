//! Keystone Approval - deciding whether a proposed action may run.
//!
//! This crate holds the authorization core:
//! - [`risk`]: score → tier → requirement, pure and total
//! - [`plan`]: the signed, immutable [`AuthorizationPlan`] and its [`PlanBuilder`]
//! - [`effect`]: declared side effects and the per-plan [`SideEffectLedger`]
//! - [`two_key`]: second-key confirmation for writes to external stores
//! - [`flow`]: caller-held review state ([`ApprovalFlow`], [`ApprovalGrant`])
//! - [`gate`]: the pure [`ApprovalGate`] decision
//!
//! # Flow
//!
//! ```text
//! PlanBuilder ─► AuthorizationPlan (signed)
//!                    │
//!                    ▼
//!            SideEffectLedger ◄── acknowledge / toggle
//!                    │           ◄── ApprovalFlow (approvals, two-key)
//!                    ▼
//!              ApprovalGate::can_execute ─► GateDecision
//! ```
//!
//! Nothing here performs a side effect. Denials are values
//! ([`GateDecision`]), not errors.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod effect;
pub mod error;
pub mod flow;
pub mod gate;
pub mod plan;
pub mod risk;
pub mod two_key;

pub use effect::{EffectId, SideEffect, SideEffectKind, SideEffectLedger};
pub use error::{ApprovalError, ApprovalResult};
pub use flow::{ApprovalFlow, ApprovalGrant, ApprovalRecord};
pub use gate::{ApprovalGate, BlockReason, GateDecision, GateState};
pub use plan::{
    AuthorizationPlan, ExecutionStep, Intent, IntentKind, PlanBuilder, Probe, ProbeKind,
};
pub use risk::{
    ApprovalRequirement, Assessment, RequirementKind, ReversibilityClass, RiskPolicy,
    final_score, requirement_from_tier, tier_from_score,
};
pub use two_key::{OperationDetails, TwoKeyOrigin, TwoKeyRequest};
