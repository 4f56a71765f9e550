#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for Keystone.
//!
//! # Usage
//!
//! ```rust,no_run
//! let resolved = keystone_config::load(None).unwrap();
//! println!("vault capacity: {}", resolved.config.vault.capacity);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment** (`KEYSTONE_LOG_LEVEL`, `KEYSTONE_DATA_DIR`,
//!    `KEYSTONE_VAULT_CAPACITY`, `KEYSTONE_VAULT_ENABLED`)
//! 2. **Explicit file** passed with `--config`
//! 3. **User** (`~/.keystone/config.toml`)
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate depends on no other Keystone crate. Translating sections into
//! domain types happens in the kernel.

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Deep merging of TOML layers.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub mod prelude;

pub use error::{ConfigError, ConfigResult};
pub use loader::{default_data_dir, load, load_file, load_with};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;
