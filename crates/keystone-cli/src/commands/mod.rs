//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod plan;
pub(crate) mod vault;
