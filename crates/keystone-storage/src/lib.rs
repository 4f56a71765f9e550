//! Keystone Storage - durable manifests for plans and the audit vault.
//!
//! A [`ManifestStore`] persists one versioned JSON [`Manifest`] using an
//! atomic write protocol (temp file, backup, rename). Reads recover from the
//! backup and finally fall back to an empty manifest, so a bad file never
//! stops the kernel.
//!
//! When the data directory is unusable the store runs in
//! [`StoreMode::Ephemeral`] and reports why through
//! [`ManifestStore::warning`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod manifest;

pub use error::{StorageError, StorageResult};
pub use manifest::{
    Loaded, LoadSource, MANIFEST_SCHEMA_VERSION, Manifest, ManifestStore, StoreMode, backup_path,
};
