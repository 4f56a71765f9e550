#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]

//! Keystone Kernel - the composition root.
//!
//! [`AuthorizationKernel`] is the one place where the signer, risk policy,
//! approval gate, audit vault and manifest stores are constructed and
//! owned. Nothing in the workspace is a hidden global: a host builds a kernel
//! from [`keystone_config::Config`] (or an injected secret) and passes it to
//! whatever coordinates an authorization flow.
//!
//! The kernel performs no side effects. Approved plans are handed to an
//! [`ExecutionEngine`] supplied by the host, and the engine's per-effect
//! report comes back as a content-free lineage event.

pub mod prelude;

/// Execution engine seam.
pub mod engine;
/// Kernel error types.
pub mod error;
/// The kernel itself.
pub mod kernel;
/// Signing key resolution.
pub mod keys;
/// Plan-to-lineage translation.
pub mod lineage;

pub use engine::{EffectOutcome, EffectStatus, EngineError, ExecutionEngine, ExecutionReport};
pub use error::{KernelError, KernelResult};
pub use kernel::{
    AuthorizationKernel, ExecutionOutcome, KernelSettings, PLANS_FILE, VAULT_FILE,
};
pub use keys::{KeySource, resolve_signing_secret};
