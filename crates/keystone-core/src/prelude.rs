//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_core::prelude::*;` to import all essential types.

pub use crate::{DayStamp, LineageId, PlanId, RiskTier, Timestamp};

pub use crate::{PermissionDomain, PermissionSnapshot};
