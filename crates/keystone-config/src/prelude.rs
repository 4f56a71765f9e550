//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_config::prelude::*;` to import all essential types.

pub use crate::{ConfigError, ConfigResult};

pub use crate::{
    ApprovalSection, Config, LoggingSection, SigningSection, StorageSection, VaultSection,
};

pub use crate::{ResolvedConfig, ShowFormat, load, load_with};
