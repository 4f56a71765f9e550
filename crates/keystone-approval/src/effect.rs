//! Side effects and the per-plan ledger that tracks them.
//!
//! Each [`SideEffect`] is one declared consequence of executing a plan. The
//! ledger is the object the approval gate and the two-key protocol operate
//! on. Effects change only through:
//!
//! - [`SideEffectLedger::toggle`]
//! - [`SideEffectLedger::acknowledge`] / [`SideEffectLedger::acknowledge_all`]
//! - the two-key flow (upgrade, revert, grant second confirmation), which is
//!   crate-internal and reachable only through [`crate::flow::ApprovalFlow`]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use keystone_core::{PermissionDomain, PermissionSnapshot, PlanId};

use crate::error::{ApprovalError, ApprovalResult};

/// Unique identifier for a side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(pub Uuid);

impl EffectId {
    /// Create a new random effect ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect:{}", self.0)
    }
}

/// Closed set of effect kinds.
///
/// All per-kind behavior is looked up by exhaustive match, so a new kind is a
/// compile-checked change in this one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    /// Hand a message to the system composer for sending.
    SendMessage,
    /// Show a reminder without saving it.
    PreviewReminder,
    /// Save a reminder.
    CreateReminder,
    /// Show a calendar event without saving it.
    PreviewCalendarEvent,
    /// Save a new calendar event.
    CreateCalendarEvent,
    /// Change an existing calendar event.
    UpdateCalendarEvent,
    /// Store an item in the assistant's local memory.
    SaveToMemory,
}

impl SideEffectKind {
    /// Stable tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::PreviewReminder => "preview_reminder",
            Self::CreateReminder => "create_reminder",
            Self::PreviewCalendarEvent => "preview_calendar_event",
            Self::CreateCalendarEvent => "create_calendar_event",
            Self::UpdateCalendarEvent => "update_calendar_event",
            Self::SaveToMemory => "save_to_memory",
        }
    }

    /// Label shown on confirmation screens.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::SendMessage => "Send message",
            Self::PreviewReminder => "Preview reminder",
            Self::CreateReminder => "Create reminder",
            Self::PreviewCalendarEvent => "Preview calendar event",
            Self::CreateCalendarEvent => "Create calendar event",
            Self::UpdateCalendarEvent => "Update calendar event",
            Self::SaveToMemory => "Save to memory",
        }
    }

    /// Permission the kind needs by default.
    #[must_use]
    pub const fn default_permission(&self) -> Option<PermissionDomain> {
        match self {
            Self::SendMessage => Some(PermissionDomain::Messages),
            Self::CreateReminder => Some(PermissionDomain::Reminders),
            Self::CreateCalendarEvent | Self::UpdateCalendarEvent => {
                Some(PermissionDomain::Calendar)
            },
            Self::PreviewReminder | Self::PreviewCalendarEvent | Self::SaveToMemory => None,
        }
    }

    /// Whether the effect changes state outside the preview surface.
    #[must_use]
    pub const fn is_write_operation(&self) -> bool {
        match self {
            Self::SendMessage
            | Self::CreateReminder
            | Self::CreateCalendarEvent
            | Self::UpdateCalendarEvent
            | Self::SaveToMemory => true,
            Self::PreviewReminder | Self::PreviewCalendarEvent => false,
        }
    }

    /// Whether the gate demands a second, independent confirmation.
    ///
    /// True for writes into a shared external store (calendar, reminders).
    #[must_use]
    pub const fn needs_two_key_confirmation(&self) -> bool {
        match self {
            Self::CreateReminder | Self::CreateCalendarEvent | Self::UpdateCalendarEvent => true,
            Self::SendMessage
            | Self::PreviewReminder
            | Self::PreviewCalendarEvent
            | Self::SaveToMemory => false,
        }
    }

    /// Whether the user completes the effect in a host surface (the kernel
    /// only hands it over).
    #[must_use]
    pub const fn requires_user_action(&self) -> bool {
        match self {
            Self::SendMessage => true,
            Self::PreviewReminder
            | Self::CreateReminder
            | Self::PreviewCalendarEvent
            | Self::CreateCalendarEvent
            | Self::UpdateCalendarEvent
            | Self::SaveToMemory => false,
        }
    }

    /// Write-capable kind a preview upgrades to.
    #[must_use]
    pub const fn write_counterpart(&self) -> Option<Self> {
        match self {
            Self::PreviewReminder => Some(Self::CreateReminder),
            Self::PreviewCalendarEvent => Some(Self::CreateCalendarEvent),
            Self::SendMessage
            | Self::CreateReminder
            | Self::CreateCalendarEvent
            | Self::UpdateCalendarEvent
            | Self::SaveToMemory => None,
        }
    }

    /// Preview-only kind a write falls back to.
    #[must_use]
    pub const fn preview_counterpart(&self) -> Option<Self> {
        match self {
            Self::CreateReminder => Some(Self::PreviewReminder),
            Self::CreateCalendarEvent | Self::UpdateCalendarEvent => {
                Some(Self::PreviewCalendarEvent)
            },
            Self::SendMessage
            | Self::PreviewReminder
            | Self::PreviewCalendarEvent
            | Self::SaveToMemory => None,
        }
    }
}

impl fmt::Display for SideEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared consequence of executing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffect {
    id: EffectId,
    kind: SideEffectKind,
    description: String,
    permission: Option<PermissionDomain>,
    enabled: bool,
    acknowledged: bool,
    second_confirmation_granted: bool,
    payload: BTreeMap<String, String>,
}

impl SideEffect {
    /// A new enabled, unacknowledged effect using the kind's default permission.
    #[must_use]
    pub fn new(kind: SideEffectKind, description: impl Into<String>) -> Self {
        Self {
            id: EffectId::new(),
            kind,
            description: description.into(),
            permission: kind.default_permission(),
            enabled: true,
            acknowledged: false,
            second_confirmation_granted: false,
            payload: BTreeMap::new(),
        }
    }

    /// Override the required permission.
    #[must_use]
    pub fn with_permission(mut self, permission: Option<PermissionDomain>) -> Self {
        self.permission = permission;
        self
    }

    /// Attach a payload field (carried over on upgrade).
    #[must_use]
    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Start disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Effect id.
    #[must_use]
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Effect kind.
    #[must_use]
    pub fn kind(&self) -> SideEffectKind {
        self.kind
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Required permission, if any.
    #[must_use]
    pub fn permission(&self) -> Option<PermissionDomain> {
        self.permission
    }

    /// Whether the effect will run.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the user acknowledged it.
    #[must_use]
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Whether the two-key step granted it.
    #[must_use]
    pub fn second_confirmation_granted(&self) -> bool {
        self.second_confirmation_granted
    }

    /// Operation payload.
    #[must_use]
    pub fn payload(&self) -> &BTreeMap<String, String> {
        &self.payload
    }

    /// See [`SideEffectKind::is_write_operation`].
    #[must_use]
    pub fn is_write_operation(&self) -> bool {
        self.kind.is_write_operation()
    }

    /// See [`SideEffectKind::needs_two_key_confirmation`].
    #[must_use]
    pub fn needs_two_key_confirmation(&self) -> bool {
        self.kind.needs_two_key_confirmation()
    }

    /// See [`SideEffectKind::requires_user_action`].
    #[must_use]
    pub fn requires_user_action(&self) -> bool {
        self.kind.requires_user_action()
    }

    /// Enabled, two-key-gated and not yet granted.
    #[must_use]
    pub fn awaiting_second_key(&self) -> bool {
        self.enabled && self.needs_two_key_confirmation() && !self.second_confirmation_granted
    }
}

/// The set of effects attached to one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectLedger {
    plan_id: PlanId,
    effects: Vec<SideEffect>,
}

impl SideEffectLedger {
    /// Empty ledger for a plan.
    #[must_use]
    pub fn new(plan_id: PlanId) -> Self {
        Self {
            plan_id,
            effects: Vec::new(),
        }
    }

    /// Builder-style [`SideEffectLedger::push`].
    #[must_use]
    pub fn with_effect(mut self, effect: SideEffect) -> Self {
        self.push(effect);
        self
    }

    /// Add an effect, returning its id.
    pub fn push(&mut self, effect: SideEffect) -> EffectId {
        let id = effect.id;
        self.effects.push(effect);
        id
    }

    /// The plan this ledger was built for.
    #[must_use]
    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    /// All effects in declaration order.
    #[must_use]
    pub fn effects(&self) -> &[SideEffect] {
        &self.effects
    }

    /// Enabled effects.
    pub fn enabled(&self) -> impl Iterator<Item = &SideEffect> {
        self.effects.iter().filter(|e| e.enabled)
    }

    /// Look up an effect.
    #[must_use]
    pub fn get(&self, id: EffectId) -> Option<&SideEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: EffectId) -> ApprovalResult<&mut SideEffect> {
        self.effects
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ApprovalError::UnknownEffect(id))
    }

    /// Flip an effect's enabled flag, returning the new value.
    ///
    /// Any acknowledgement or second confirmation is cleared: the set of
    /// effects the user agreed to has changed.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownEffect`] if the id is not in the ledger.
    pub fn toggle(&mut self, id: EffectId) -> ApprovalResult<bool> {
        let effect = self.get_mut(id)?;
        effect.enabled = !effect.enabled;
        effect.acknowledged = false;
        effect.second_confirmation_granted = false;
        debug!(effect_id = %id, enabled = effect.enabled, "side effect toggled");
        Ok(effect.enabled)
    }

    /// Mark an effect acknowledged. Never grants a second confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::UnknownEffect`] if the id is not in the ledger.
    pub fn acknowledge(&mut self, id: EffectId) -> ApprovalResult<()> {
        self.get_mut(id)?.acknowledged = true;
        debug!(effect_id = %id, "side effect acknowledged");
        Ok(())
    }

    /// Acknowledge every enabled effect.
    pub fn acknowledge_all(&mut self) {
        for effect in self.effects.iter_mut().filter(|e| e.enabled) {
            effect.acknowledged = true;
        }
    }

    /// Number of enabled effects not yet acknowledged.
    #[must_use]
    pub fn unacknowledged_count(&self) -> usize {
        self.enabled().filter(|e| !e.acknowledged).count()
    }

    /// Permissions needed by enabled effects that the snapshot does not grant,
    /// in first-seen order without duplicates.
    #[must_use]
    pub fn missing_permissions(&self, snapshot: &PermissionSnapshot) -> Vec<PermissionDomain> {
        let mut missing = Vec::new();
        for domain in self.enabled().filter_map(|e| e.permission) {
            if !snapshot.is_granted(domain) && !missing.contains(&domain) {
                missing.push(domain);
            }
        }
        missing
    }

    /// Enabled two-key effects still lacking a second confirmation.
    #[must_use]
    pub fn pending_two_key(&self) -> Vec<EffectId> {
        self.effects
            .iter()
            .filter(|e| e.awaiting_second_key())
            .map(|e| e.id)
            .collect()
    }

    /// Convert a preview effect into its write counterpart, returning the
    /// original kind. The payload is carried over; acknowledgement and second
    /// confirmation start cleared.
    pub(crate) fn upgrade_to_write(&mut self, id: EffectId) -> ApprovalResult<SideEffectKind> {
        let effect = self.get_mut(id)?;
        let original = effect.kind;
        let Some(write) = original.write_counterpart() else {
            return Err(ApprovalError::InvalidTransition {
                effect_id: id,
                operation: "upgrade",
                reason: format!("{original} has no write counterpart"),
            });
        };
        effect.kind = write;
        effect.permission = write.default_permission();
        effect.acknowledged = false;
        effect.second_confirmation_granted = false;
        Ok(original)
    }

    /// Put an upgraded effect back to its preview form. `kind` must be the
    /// preview counterpart of the effect's current kind.
    pub(crate) fn revert_kind(&mut self, id: EffectId, kind: SideEffectKind) -> ApprovalResult<()> {
        let effect = self.get_mut(id)?;
        if effect.kind.preview_counterpart() != Some(kind) {
            return Err(ApprovalError::InvalidTransition {
                effect_id: id,
                operation: "revert",
                reason: format!("{} is not the preview form of {}", kind, effect.kind),
            });
        }
        effect.kind = kind;
        effect.permission = kind.default_permission();
        effect.acknowledged = false;
        effect.second_confirmation_granted = false;
        Ok(())
    }

    pub(crate) fn grant_second_confirmation(&mut self, id: EffectId) -> ApprovalResult<()> {
        let effect = self.get_mut(id)?;
        if !effect.needs_two_key_confirmation() {
            return Err(ApprovalError::InvalidTransition {
                effect_id: id,
                operation: "grant second confirmation",
                reason: format!("{} does not take a second key", effect.kind),
            });
        }
        effect.second_confirmation_granted = true;
        Ok(())
    }
}
