//! Content-free lineage records.
//!
//! A [`Lineage`] describes *that* something happened to an item (which
//! context it belonged to, how it ended, what policy let it through) using
//! only enums, counts, hashes and day-granular dates.
//!
//! # Hash Input
//!
//! The hash is SHA-256 over tagged fields joined with `|`, in this order:
//!
//! ```text
//! id:<uuid>|proc:<hex|none>|slot:<slot>|outcome:<outcome>|policy:<policy>|tier:<tier>|edits:<n>|created:<yyyy-mm-dd>|schema:<n>
//! ```
//!
//! The order and tags are fixed so hashes are reproducible elsewhere.

use serde::{Deserialize, Serialize};
use std::fmt;

use keystone_core::{DayStamp, LineageId, RiskTier};
use keystone_crypto::ContentHash;

/// Current lineage schema version.
pub const LINEAGE_SCHEMA_VERSION: u32 = 1;

/// Separator between tagged hash fields.
const FIELD_SEPARATOR: &str = "|";

macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $tag:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Stable tag used in hashes and exports.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

tag_enum! {
    /// Which assistant surface the item belonged to.
    ContextSlot {
        /// Messaging.
        Messages => "messages",
        /// Calendar.
        Calendar => "calendar",
        /// Reminders.
        Reminders => "reminders",
        /// Local memory.
        Memory => "memory",
        /// Anything else.
        General => "general",
    }
}

tag_enum! {
    /// How the item ended up.
    OutcomeType {
        /// A draft was produced.
        Drafted => "drafted",
        /// The plan was approved.
        Approved => "approved",
        /// The engine ran it successfully.
        Executed => "executed",
        /// The engine reported failure.
        Failed => "failed",
        /// The user abandoned it.
        Cancelled => "cancelled",
        /// The gate refused it.
        Denied => "denied",
    }
}

tag_enum! {
    /// Which policy path let the item through (or not).
    PolicyDecision {
        /// Low tier; no human approval needed.
        AutoApproved => "auto_approved",
        /// A human approved it.
        UserApproved => "user_approved",
        /// A human approved it and granted every second key.
        TwoKeyConfirmed => "two_key_confirmed",
        /// Blocked pending review.
        Blocked => "blocked",
        /// Rejected (tamper or mismatched inputs).
        Denied => "denied",
    }
}

/// A content-free provenance record with a deterministic hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// Opaque id.
    pub id: LineageId,
    /// Caller-supplied procedure hash.
    pub procedure_hash: Option<ContentHash>,
    /// Context slot.
    pub context_slot: ContextSlot,
    /// Outcome.
    pub outcome: OutcomeType,
    /// Policy decision.
    pub policy: PolicyDecision,
    /// Risk tier at the time of the event.
    pub tier: RiskTier,
    /// Number of edits before the outcome.
    pub edit_count: u32,
    /// Day the item was created.
    pub created: DayStamp,
    /// Day the item last changed (not hashed).
    pub modified: DayStamp,
    /// Schema version.
    pub schema_version: u32,
    /// SHA-256 over the tagged fields.
    pub hash: ContentHash,
}

impl Lineage {
    /// Create a record with a fresh id, no procedure hash and zero edits.
    #[must_use]
    pub fn new(
        context_slot: ContextSlot,
        outcome: OutcomeType,
        policy: PolicyDecision,
        tier: RiskTier,
        created: DayStamp,
    ) -> Self {
        let mut lineage = Self {
            id: LineageId::new(),
            procedure_hash: None,
            context_slot,
            outcome,
            policy,
            tier,
            edit_count: 0,
            created,
            modified: created,
            schema_version: LINEAGE_SCHEMA_VERSION,
            hash: ContentHash::from_bytes([0u8; 32]),
        };
        lineage.seal();
        lineage
    }

    /// Use a specific id.
    #[must_use]
    pub fn with_id(mut self, id: LineageId) -> Self {
        self.id = id;
        self.seal();
        self
    }

    /// Attach a procedure hash.
    #[must_use]
    pub fn with_procedure_hash(mut self, hash: ContentHash) -> Self {
        self.procedure_hash = Some(hash);
        self.seal();
        self
    }

    /// Set the edit count.
    #[must_use]
    pub fn with_edit_count(mut self, edits: u32) -> Self {
        self.edit_count = edits;
        self.seal();
        self
    }

    /// Set the last-modified day.
    #[must_use]
    pub fn with_modified(mut self, modified: DayStamp) -> Self {
        self.modified = modified;
        self.seal();
        self
    }

    /// The exact string that is hashed.
    #[must_use]
    pub fn hash_input(&self) -> String {
        let proc = self
            .procedure_hash
            .map_or_else(|| "none".to_string(), |h| h.to_hex());
        [
            format!("id:{}", self.id.0),
            format!("proc:{proc}"),
            format!("slot:{}", self.context_slot),
            format!("outcome:{}", self.outcome),
            format!("policy:{}", self.policy),
            format!("tier:{}", self.tier),
            format!("edits:{}", self.edit_count),
            format!("created:{}", self.created),
            format!("schema:{}", self.schema_version),
        ]
        .join(FIELD_SEPARATOR)
    }

    /// Recompute the hash from the current fields.
    #[must_use]
    pub fn compute_hash(&self) -> ContentHash {
        ContentHash::hash(self.hash_input().as_bytes())
    }

    /// Whether the stored hash matches the fields.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    fn seal(&mut self) {
        self.hash = self.compute_hash();
    }
}
