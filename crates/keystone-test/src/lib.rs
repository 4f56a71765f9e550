//! Keystone Test - shared fixtures and mocks.
//!
//! Used as a dev-dependency by the kernel and the integration tests.
//!
//! ```rust,ignore
//! use keystone_test::{build_plan, send_message_builder, two_effect_ledger};
//!
//! let plan = build_plan(send_message_builder());
//! let ledger = two_effect_ledger(plan.id());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test-friendly subscriber once; later calls are no-ops.
///
/// Honors `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
