//! Config file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge `~/.keystone/config.toml` (user), if present
//! 3. Merge the explicit `--config` file, which must exist
//! 4. Apply `KEYSTONE_*` environment overrides
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Directory under the home directory holding user-level state.
pub const KEYSTONE_DIR: &str = ".keystone";

/// Load configuration from the real home directory and process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the home directory cannot be found, a file
/// is malformed, an override does not parse, or validation fails.
pub fn load(explicit: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let home = home_directory()?;
    load_with(Some(&home), explicit, &collect_env_vars())
}

/// Load configuration with every input supplied by the caller.
///
/// `home` is the user's home directory; `None` skips the user layer.
///
/// # Errors
///
/// See [`load`].
pub fn load_with<S: BuildHasher>(
    home: Option<&Path>,
    explicit: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    if let Some(home) = home {
        let user_path = home.join(KEYSTONE_DIR).join("config.toml");
        if let Some(overlay) = try_load_file(&user_path)? {
            deep_merge(&mut merged, &overlay);
            info!(path = %user_path.display(), "loaded user config");
            loaded_files.push(user_path.display().to_string());
        }
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "config file not found"),
        })?;
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded explicit config");
        loaded_files.push(path.display().to_string());
    }

    let env_overrides = apply_env_overrides(&mut merged, env_vars)?;

    let config: Config = merged.try_into().map_err(|e| ConfigError::ParseError {
        path: "<merged config>".to_owned(),
        source: e,
    })?;
    validate::validate(&config)?;

    debug!(
        files = loaded_files.len(),
        env_overrides, "configuration resolved"
    );

    Ok(ResolvedConfig {
        config,
        loaded_files,
        env_overrides,
    })
}

/// Load a single configuration file over the embedded defaults, without
/// the user layer or env overrides.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let empty: HashMap<String, String> = HashMap::new();
    load_with(None, Some(path), &empty).map(|resolved| resolved.config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let len = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if len > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {len} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

/// Platform data directory for Keystone (for example
/// `~/.local/share/keystone` on Linux).
///
/// # Errors
///
/// Returns [`ConfigError::NoHomeDir`] if no home directory can be found.
pub fn default_data_dir() -> ConfigResult<PathBuf> {
    if let Some(dirs) = directories::ProjectDirs::from("", "", "keystone") {
        return Ok(dirs.data_dir().to_path_buf());
    }
    home_directory().map(|home| home.join(KEYSTONE_DIR).join("data"))
}

impl Config {
    /// The configured data directory, or the platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] if unset and no home directory exists.
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }
}
