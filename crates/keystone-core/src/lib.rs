//! Keystone Core - shared vocabulary for the authorization kernel.
//!
//! This crate provides the small set of types every other keystone crate
//! speaks in:
//! - Identifiers ([`PlanId`], [`LineageId`])
//! - Time ([`Timestamp`] and the day-granular [`DayStamp`] used by the audit vault)
//! - Risk classification ([`RiskTier`])
//! - The read-only permission view handed in by the host ([`PermissionSnapshot`])
//!
//! It has no dependencies on other keystone crates.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod permission;
pub mod types;

pub use permission::{PermissionDomain, PermissionSnapshot};
pub use types::{DayStamp, LineageId, PlanId, RiskTier, Timestamp};
