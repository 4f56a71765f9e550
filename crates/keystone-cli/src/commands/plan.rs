//! Plan commands: propose, verify and list signed plans.

use std::path::Path;

use clap::ValueEnum;
use keystone_approval::{
    AuthorizationPlan, ExecutionStep, IntentKind, PlanBuilder, Probe, ProbeKind,
    ReversibilityClass,
};
use keystone_kernel::AuthorizationKernel;

use crate::theme::Theme;

/// Intent kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum IntentArg {
    /// Send a new message.
    SendMessage,
    /// Reply within an existing conversation.
    ReplyMessage,
    /// Create a reminder.
    CreateReminder,
    /// Schedule a calendar event.
    ScheduleEvent,
    /// Change a calendar event.
    UpdateEvent,
    /// Save an item to memory.
    SaveMemory,
    /// Produce a summary.
    Summarize,
}

impl From<IntentArg> for IntentKind {
    fn from(arg: IntentArg) -> Self {
        match arg {
            IntentArg::SendMessage => Self::SendMessage,
            IntentArg::ReplyMessage => Self::ReplyMessage,
            IntentArg::CreateReminder => Self::CreateReminder,
            IntentArg::ScheduleEvent => Self::ScheduleEvent,
            IntentArg::UpdateEvent => Self::UpdateEvent,
            IntentArg::SaveMemory => Self::SaveMemory,
            IntentArg::Summarize => Self::Summarize,
        }
    }
}

/// Reversibility classes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReversibilityArg {
    /// Fully undoable.
    Reversible,
    /// Partly undoable.
    Partial,
    /// Cannot be undone.
    Irreversible,
}

impl From<ReversibilityArg> for ReversibilityClass {
    fn from(arg: ReversibilityArg) -> Self {
        match arg {
            ReversibilityArg::Reversible => Self::Reversible,
            ReversibilityArg::Partial => Self::PartiallyReversible,
            ReversibilityArg::Irreversible => Self::Irreversible,
        }
    }
}

/// Everything `plan propose` needs to draft a plan.
#[derive(Debug, Clone)]
pub(crate) struct ProposeArgs {
    pub(crate) intent: IntentArg,
    pub(crate) summary: String,
    pub(crate) target: String,
    pub(crate) base_risk: i32,
    pub(crate) reversibility: ReversibilityArg,
    pub(crate) explanation: Option<String>,
    pub(crate) reasons: Vec<String>,
    pub(crate) permissions: Vec<String>,
    pub(crate) reads: Vec<String>,
    pub(crate) writes: Vec<String>,
}

impl ProposeArgs {
    fn into_builder(self) -> PlanBuilder {
        let reversibility = ReversibilityClass::from(self.reversibility);
        let explanation = self
            .explanation
            .unwrap_or_else(|| reversibility.as_str().replace('_', " "));

        let mut builder = PlanBuilder::new()
            .intent(self.intent.into(), self.summary, self.target)
            .base_risk(self.base_risk)
            .reversibility(reversibility, explanation);
        for reason in self.reasons {
            builder = builder.risk_reason(reason);
        }
        for domain in self.permissions {
            builder = builder.probe(Probe::required(ProbeKind::Permission, domain));
        }
        for action in self.reads {
            builder = builder.step(ExecutionStep::read(action));
        }
        for action in self.writes {
            builder = builder.step(ExecutionStep::mutation(action, None));
        }
        builder
    }
}

/// Draft, sign and store a plan, then print it as JSON.
pub(crate) fn propose(kernel: &mut AuthorizationKernel, args: ProposeArgs) -> anyhow::Result<()> {
    let plan = kernel
        .propose(args.into_builder())
        .ok_or_else(|| anyhow::anyhow!("plan has no intent"))?;

    eprintln!(
        "{}",
        Theme::success(&format!(
            "Plan {} signed: score {}, tier {}, requires {}",
            plan.id(),
            plan.risk_score(),
            Theme::tier(plan.tier()),
            plan.requirement().kind
        ))
    );
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Read a plan from a JSON file and check its signature.
pub(crate) fn verify(kernel: &mut AuthorizationKernel, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    let plan: AuthorizationPlan = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("{} is not a plan: {e}", path.display()))?;

    match kernel.verify(&plan) {
        Ok(()) => {
            println!("{}", Theme::success(&format!("Plan {} is intact", plan.id())));
            println!("  Intent:      {}", plan.intent().kind);
            println!("  Risk:        {} ({})", plan.risk_score(), Theme::tier(plan.tier()));
            println!("  Requirement: {}", plan.requirement().kind);
            Ok(())
        },
        Err(e) => {
            println!("{}", Theme::error(&format!("Plan {} failed verification", plan.id())));
            Err(e.into())
        },
    }
}

/// List stored plans.
pub(crate) fn list(kernel: &AuthorizationKernel) {
    let plans = kernel.plans();

    println!("\n{}", Theme::header("Stored Plans"));
    println!("{}", Theme::separator());

    if plans.is_empty() {
        println!("{}", Theme::dimmed("  No plans stored."));
    }

    for plan in plans {
        println!(
            "  {}  {:<16} {:>3}  {:<8}  {}",
            Theme::dimmed(&plan.created_at().to_string()),
            plan.intent().kind,
            plan.risk_score(),
            Theme::tier(plan.tier()),
            plan.requirement().kind,
        );
        println!("    {}", Theme::dimmed(&plan.id().to_string()));
    }

    if kernel.rejected_on_load() > 0 {
        println!(
            "\n{}",
            Theme::warning(&format!(
                "{} stored plan(s) failed verification and were ignored",
                kernel.rejected_on_load()
            ))
        );
    }
    println!();
}
