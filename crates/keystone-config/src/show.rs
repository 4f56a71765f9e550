//! Resolved configuration display for `config show`.

use std::fmt::Write as _;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// A resolved configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Config file paths that were loaded, in precedence order.
    pub loaded_files: Vec<String>,
    /// Number of `KEYSTONE_*` overrides applied.
    pub env_overrides: usize,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with a header listing the layers.
    Toml,
    /// JSON (for programmatic consumption).
    Json,
}

impl ResolvedConfig {
    /// Render the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if serialization fails.
    pub fn show(&self, format: ShowFormat) -> ConfigResult<String> {
        match format {
            ShowFormat::Toml => self.show_toml(),
            ShowFormat::Json => serde_json::to_string_pretty(&self.config).map_err(|e| {
                ConfigError::ValidationError {
                    field: "<show>".to_owned(),
                    message: e.to_string(),
                }
            }),
        }
    }

    fn show_toml(&self) -> ConfigResult<String> {
        let body = toml::to_string_pretty(&self.config).map_err(|e| ConfigError::ValidationError {
            field: "<show>".to_owned(),
            message: e.to_string(),
        })?;

        let mut output = String::from("# Resolved Keystone configuration\n");
        if self.loaded_files.is_empty() {
            output.push_str("# Loaded files: none (embedded defaults only)\n");
        } else {
            output.push_str("# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                let _ = writeln!(output, "#   {}. {path}", i.saturating_add(1));
            }
        }
        if self.env_overrides > 0 {
            let _ = writeln!(output, "# Environment overrides applied: {}", self.env_overrides);
        }
        output.push('\n');
        output.push_str(&body);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            config: Config::default(),
            loaded_files: vec!["/home/u/.keystone/config.toml".into()],
            env_overrides: 2,
        }
    }

    #[test]
    fn test_show_toml_header() {
        let out = resolved().show(ShowFormat::Toml).unwrap();
        assert!(out.starts_with("# Resolved Keystone configuration"));
        assert!(out.contains("#   1. /home/u/.keystone/config.toml"));
        assert!(out.contains("overrides applied: 2"));
        assert!(out.contains("[vault]"));
        assert!(out.contains("capacity = 500"));
    }

    #[test]
    fn test_show_json() {
        let out = resolved().show(ShowFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["vault"]["capacity"], 500);
        assert_eq!(value["signing"]["key_env"], "KEYSTONE_SIGNING_KEY");
    }
}
