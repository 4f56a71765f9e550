//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_kernel::prelude::*;` to import all essential types.

pub use crate::{KernelError, KernelResult};

pub use crate::{AuthorizationKernel, ExecutionOutcome, KernelSettings, KeySource};

pub use crate::{EffectOutcome, EffectStatus, EngineError, ExecutionEngine, ExecutionReport};
