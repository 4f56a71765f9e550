//! Versioned JSON manifests with an atomic write protocol.
//!
//! On disk a manifest is `{ "items": [...], "saved_at": ..., "schema_version": n }`
//! with keys sorted and dates in ISO-8601.
//!
//! # Write protocol
//!
//! 1. encode
//! 2. write to a temp file in the same directory and fsync it
//! 3. copy the current file to `<name>.bak`
//! 4. atomically rename the temp file over the original
//! 5. delete the backup
//!
//! A failure at any step leaves the previous manifest (or its backup) intact.
//!
//! # Read protocol
//!
//! Read the primary file; on failure try the backup; on failure start empty.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use keystone_core::Timestamp;

use crate::error::{StorageError, StorageResult};

/// Current manifest schema version.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// The persisted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest<T> {
    /// Schema version the file was written with.
    pub schema_version: u32,
    /// Stored items.
    pub items: Vec<T>,
    /// When the manifest was written.
    pub saved_at: Timestamp,
}

impl<T> Manifest<T> {
    /// A manifest with no items, stamped now.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            items: Vec::new(),
            saved_at: Timestamp::now(),
        }
    }
}

/// Whether a store writes to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// Backed by a file.
    Durable {
        /// Manifest path.
        path: PathBuf,
    },
    /// In memory only; nothing survives the process.
    Ephemeral {
        /// Why durable storage is unavailable.
        reason: String,
    },
}

/// Where a load came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// The primary file.
    Primary,
    /// The backup file, after the primary failed.
    Backup,
    /// Nothing usable; started empty.
    Empty,
}

/// A manifest plus where it was read from.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    /// The manifest.
    pub manifest: Manifest<T>,
    /// Where it came from.
    pub source: LoadSource,
}

/// File-backed (or degraded in-memory) store for one manifest.
#[derive(Debug)]
pub struct ManifestStore<T> {
    mode: StoreMode,
    memory: Option<Vec<u8>>,
    _items: PhantomData<fn() -> T>,
}

impl<T> ManifestStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a store at `path`, creating the parent directory.
    ///
    /// If the directory cannot be created or written, the store degrades to
    /// [`StoreMode::Ephemeral`] instead of failing.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match probe_writable(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "manifest store opened");
                Self::with_mode(StoreMode::Durable { path })
            },
            Err(e) => {
                let reason = format!("{}: {e}", path.display());
                warn!(
                    path = %path.display(),
                    error = %e,
                    "storage unavailable, running in-memory only"
                );
                Self::ephemeral(reason)
            },
        }
    }

    /// An in-memory store.
    #[must_use]
    pub fn ephemeral(reason: impl Into<String>) -> Self {
        Self::with_mode(StoreMode::Ephemeral {
            reason: reason.into(),
        })
    }

    fn with_mode(mode: StoreMode) -> Self {
        Self {
            mode,
            memory: None,
            _items: PhantomData,
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> &StoreMode {
        &self.mode
    }

    /// Why the store is in-memory only, if it is.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match &self.mode {
            StoreMode::Durable { .. } => None,
            StoreMode::Ephemeral { reason } => Some(reason.as_str()),
        }
    }

    /// Manifest path, when durable.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.mode {
            StoreMode::Durable { path } => Some(path),
            StoreMode::Ephemeral { .. } => None,
        }
    }

    /// Read the manifest strictly from its primary location.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing has been saved, or
    /// [`StorageError::LoadFailed`] if it cannot be read or decoded.
    pub fn try_load(&self) -> StorageResult<Manifest<T>> {
        match &self.mode {
            StoreMode::Durable { path } => read_manifest(path),
            StoreMode::Ephemeral { .. } => match &self.memory {
                Some(bytes) => decode(Path::new("<memory>"), bytes),
                None => Err(StorageError::NotFound(PathBuf::from("<memory>"))),
            },
        }
    }

    /// Read the manifest, recovering from the backup and falling back to empty.
    #[must_use]
    pub fn load(&self) -> Loaded<T> {
        let primary_err = match self.try_load() {
            Ok(manifest) => {
                return Loaded {
                    manifest,
                    source: LoadSource::Primary,
                };
            },
            Err(e) => e,
        };

        let StoreMode::Durable { path } = &self.mode else {
            return empty();
        };

        let backup = backup_path(path);
        match read_manifest(&backup) {
            Ok(manifest) => {
                warn!(
                    path = %path.display(),
                    error = %primary_err,
                    "manifest recovered from backup"
                );
                Loaded {
                    manifest,
                    source: LoadSource::Backup,
                }
            },
            Err(StorageError::NotFound(_)) if matches!(primary_err, StorageError::NotFound(_)) => {
                debug!(path = %path.display(), "no manifest yet");
                empty()
            },
            Err(backup_err) => {
                warn!(
                    path = %path.display(),
                    error = %primary_err,
                    backup_error = %backup_err,
                    "manifest unreadable, starting empty"
                );
                empty()
            },
        }
    }

    /// Replace the stored items.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::EncodingFailed`] if the items cannot be
    /// encoded, or [`StorageError::WriteFailed`] if the atomic write fails.
    /// In both cases the previously saved manifest is unchanged.
    pub fn save(&mut self, items: &[T]) -> StorageResult<()>
    where
        T: Clone,
    {
        let manifest = Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            items: items.to_vec(),
            saved_at: Timestamp::now(),
        };
        let bytes = encode(&manifest)?;

        match &self.mode {
            StoreMode::Durable { path } => {
                atomic_write(path, &bytes)?;
                debug!(path = %path.display(), items = items.len(), "manifest saved");
            },
            StoreMode::Ephemeral { .. } => {
                self.memory = Some(bytes);
            },
        }
        Ok(())
    }
}

fn empty<T>() -> Loaded<T> {
    Loaded {
        manifest: Manifest::empty(),
        source: LoadSource::Empty,
    }
}

/// `<file name>.bak` next to `path`.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

fn probe_writable(path: &Path) -> io::Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent)?;
    tempfile::NamedTempFile::new_in(parent).map(drop)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Encode with sorted keys.
fn encode<T: Serialize>(manifest: &Manifest<T>) -> StorageResult<Vec<u8>> {
    // `Value` objects are `BTreeMap`s, so keys come out sorted.
    let value =
        serde_json::to_value(manifest).map_err(|e| StorageError::EncodingFailed(e.to_string()))?;
    let mut bytes =
        serde_json::to_vec_pretty(&value).map_err(|e| StorageError::EncodingFailed(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> StorageResult<Manifest<T>> {
    let manifest: Manifest<T> =
        serde_json::from_slice(bytes).map_err(|e| StorageError::LoadFailed {
            path: path.to_path_buf(),
            reason: format!("corrupt manifest: {e}"),
        })?;
    if manifest.schema_version > MANIFEST_SCHEMA_VERSION {
        return Err(StorageError::LoadFailed {
            path: path.to_path_buf(),
            reason: format!(
                "unsupported schema version {} (max {MANIFEST_SCHEMA_VERSION})",
                manifest.schema_version
            ),
        });
    }
    Ok(manifest)
}

fn read_manifest<T: DeserializeOwned>(path: &Path) -> StorageResult<Manifest<T>> {
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_path_buf())
        } else {
            StorageError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })?;
    decode(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let write_err = |step: &str, e: &dyn std::fmt::Display| StorageError::WriteFailed {
        path: path.to_path_buf(),
        reason: format!("{step}: {e}"),
    };

    let parent = parent_dir(path);
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| write_err("failed to create temp file", &e))?;
    tmp.write_all(bytes)
        .map_err(|e| write_err("failed to write temp file", &e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_err("failed to sync temp file", &e))?;

    let backup = backup_path(path);
    let had_original = path.exists();
    if had_original {
        fs::copy(path, &backup).map_err(|e| write_err("failed to back up manifest", &e))?;
    }

    tmp.persist(path)
        .map_err(|e| write_err("failed to replace manifest", &e.error))?;

    if had_original {
        if let Err(e) = fs::remove_file(&backup) {
            info!(path = %backup.display(), error = %e, "stale manifest backup left in place");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Item {
        name: String,
        count: u32,
    }

    fn item(name: &str, count: u32) -> Item {
        Item {
            name: name.to_string(),
            count,
        }
    }

    #[test]
    fn test_missing_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store: ManifestStore<Item> = ManifestStore::open(dir.path().join("plans.json"));
        assert!(matches!(store.try_load(), Err(StorageError::NotFound(_))));
        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Empty);
        assert!(loaded.manifest.items.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("plans.json");
        let mut store = ManifestStore::open(&path);
        assert!(store.warning().is_none());

        store.save(&[item("a", 1), item("b", 2)]).unwrap();
        store.save(&[item("c", 3)]).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Primary);
        assert_eq!(loaded.manifest.items, vec![item("c", 3)]);
        assert_eq!(loaded.manifest.schema_version, MANIFEST_SCHEMA_VERSION);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_keys_sorted_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        let mut store = ManifestStore::open(&path);
        store.save(&[item("a", 1)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let items = text.find("\"items\"").unwrap();
        let saved = text.find("\"saved_at\"").unwrap();
        let schema = text.find("\"schema_version\"").unwrap();
        assert!(items < saved && saved < schema);
        assert!(text.find("\"count\"").unwrap() < text.find("\"name\"").unwrap());
    }

    #[test]
    fn test_corrupt_primary_recovers_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        let mut store = ManifestStore::open(&path);
        store.save(&[item("good", 1)]).unwrap();

        fs::copy(&path, backup_path(&path)).unwrap();
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(store.try_load(), Err(StorageError::LoadFailed { .. })));
        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Backup);
        assert_eq!(loaded.manifest.items, vec![item("good", 1)]);
    }

    #[test]
    fn test_corrupt_without_backup_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        fs::write(&path, b"garbage").unwrap();
        let store: ManifestStore<Item> = ManifestStore::open(&path);
        let loaded = store.load();
        assert_eq!(loaded.source, LoadSource::Empty);
    }

    #[test]
    fn test_future_schema_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        fs::write(
            &path,
            br#"{"items":[],"saved_at":"2026-10-19T00:00:00Z","schema_version":99}"#,
        )
        .unwrap();
        let store: ManifestStore<Item> = ManifestStore::open(&path);
        assert!(matches!(store.try_load(), Err(StorageError::LoadFailed { .. })));
    }

    #[test]
    fn test_unwritable_dir_degrades() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let mut store: ManifestStore<Item> = ManifestStore::open(blocker.join("m.json"));
        assert!(matches!(store.mode(), StoreMode::Ephemeral { .. }));
        assert!(store.warning().is_some());
        assert!(store.path().is_none());

        store.save(&[item("mem", 7)]).unwrap();
        assert_eq!(store.load().manifest.items, vec![item("mem", 7)]);
    }

    #[test]
    fn test_backup_path_name() {
        assert_eq!(
            backup_path(Path::new("/data/plans.json")),
            PathBuf::from("/data/plans.json.bak")
        );
    }
}
