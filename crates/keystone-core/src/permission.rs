//! Host permission domains and the read-only snapshot the gate consumes.
//!
//! The kernel never requests a permission itself. The host reports the
//! current grant state as a [`PermissionSnapshot`] and the approval gate
//! treats it as input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A permission domain a side effect may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDomain {
    /// Calendar read/write access.
    Calendar,
    /// Reminders read/write access.
    Reminders,
    /// Contacts lookup.
    Contacts,
    /// Ability to hand a message to the system composer.
    Messages,
    /// Local notifications.
    Notifications,
}

impl PermissionDomain {
    /// Stable lowercase tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Reminders => "reminders",
            Self::Contacts => "contacts",
            Self::Messages => "messages",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for PermissionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of which permission domains are granted.
///
/// Domains absent from the snapshot are treated as not granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    granted: BTreeMap<PermissionDomain, bool>,
}

impl PermissionSnapshot {
    /// An empty snapshot (nothing granted).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the grant state of a domain.
    #[must_use]
    pub fn with(mut self, domain: PermissionDomain, granted: bool) -> Self {
        self.granted.insert(domain, granted);
        self
    }

    /// Mark a domain as granted.
    #[must_use]
    pub fn grant(self, domain: PermissionDomain) -> Self {
        self.with(domain, true)
    }

    /// Whether the domain is currently granted.
    #[must_use]
    pub fn is_granted(&self, domain: PermissionDomain) -> bool {
        self.granted.get(&domain).copied().unwrap_or(false)
    }
}

impl FromIterator<(PermissionDomain, bool)> for PermissionSnapshot {
    fn from_iter<I: IntoIterator<Item = (PermissionDomain, bool)>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}
