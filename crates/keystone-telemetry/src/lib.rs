//! Keystone Telemetry - logging setup for the keystone binaries.
//!
//! Library crates only emit `tracing` events with structured fields (ids,
//! enums, counts). This crate installs the subscriber that renders them.
//!
//! # Example
//!
//! ```rust,no_run
//! use keystone_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), keystone_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("keystone_audit=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!(plans = 3, "kernel ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, KNOWN_LEVELS, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
