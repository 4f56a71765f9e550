//! Config command: show the resolved configuration.

use clap::ValueEnum;
use keystone_config::{ResolvedConfig, ShowFormat};

use crate::theme::Theme;

/// Output formats for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum FormatArg {
    /// Annotated TOML.
    #[default]
    Toml,
    /// JSON.
    Json,
}

impl From<FormatArg> for ShowFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Toml => Self::Toml,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Print the resolved configuration.
pub(crate) fn show(resolved: &ResolvedConfig, format: FormatArg) -> anyhow::Result<()> {
    let rendered = resolved.show(format.into())?;
    println!("{rendered}");
    if format == FormatArg::Toml && resolved.env_overrides > 0 {
        eprintln!(
            "{}",
            Theme::dimmed(&format!(
                "{} value(s) overridden by KEYSTONE_* environment variables",
                resolved.env_overrides
            ))
        );
    }
    Ok(())
}
