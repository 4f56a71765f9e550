//! Keystone CLI - operator surface for the authorization kernel.
//!
//! Proposes and verifies signed plans, inspects the content-free audit
//! vault and shows the resolved configuration. Nothing here performs the
//! side effects a plan describes.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use keystone_config::{Config, ResolvedConfig};
use keystone_kernel::AuthorizationKernel;
use keystone_telemetry::{LogConfig, LogFormat};

mod commands;
mod theme;

use commands::config::FormatArg;
use commands::plan::{IntentArg, ProposeArgs, ReversibilityArg};
use commands::{config, plan, vault};
use theme::Theme;

/// Keystone - capability authorization kernel
#[derive(Parser)]
#[command(name = "keystone")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to an explicit configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose, verify and list signed plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },

    /// Inspect the audit vault
    Vault {
        #[command(subcommand)]
        command: VaultCommands,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Draft and sign a plan, printing it as JSON
    Propose {
        /// Intent kind
        #[arg(long, value_enum)]
        intent: IntentArg,

        /// Summary shown during review
        #[arg(long)]
        summary: String,

        /// Target of the action (recipient, calendar, list)
        #[arg(long)]
        target: String,

        /// Base risk before the reversibility modifier
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        base_risk: i32,

        /// Whether the action can be undone
        #[arg(long, value_enum, default_value = "irreversible")]
        reversibility: ReversibilityArg,

        /// Why the action is (ir)reversible
        #[arg(long)]
        explanation: Option<String>,

        /// Risk reason (repeatable)
        #[arg(long = "reason")]
        reasons: Vec<String>,

        /// Required permission domain (repeatable)
        #[arg(long = "permission")]
        permissions: Vec<String>,

        /// Read-only step (repeatable)
        #[arg(long = "read")]
        reads: Vec<String>,

        /// State-mutating step (repeatable)
        #[arg(long = "write")]
        writes: Vec<String>,
    },

    /// Verify a plan stored as JSON
    Verify {
        /// Path to the plan JSON
        file: PathBuf,
    },

    /// List stored plans
    List,
}

#[derive(Subcommand)]
enum VaultCommands {
    /// Show aggregate counts
    Summary,

    /// Print a validated, content-free export as JSON
    Export,

    /// Destroy every vault event
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: FormatArg,
    },
}

/// Build the logging configuration from the `[logging]` section.
fn log_config(config: &Config, verbose: bool) -> LogConfig {
    let format = config
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or_default();
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    LogConfig::new(level)
        .with_format(format)
        .with_directives(config.logging.directives.iter().cloned())
}

fn open_kernel(resolved: &ResolvedConfig) -> Result<AuthorizationKernel> {
    let kernel = AuthorizationKernel::from_config(&resolved.config)?;
    if let Some(warning) = kernel.storage_warning() {
        eprintln!("{}", Theme::warning(&warning));
    }
    Ok(kernel)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = keystone_config::load(cli.config.as_deref())?;

    if let Err(e) = keystone_telemetry::setup_logging(&log_config(&resolved.config, cli.verbose))
    {
        eprintln!("Failed to initialize logging: {e}");
    }
    debug!(
        files = resolved.loaded_files.len(),
        env_overrides = resolved.env_overrides,
        "configuration resolved"
    );

    match cli.command {
        Commands::Plan { command } => handle_plan(&resolved, command),
        Commands::Vault { command } => handle_vault(&resolved, command),
        Commands::Config { command } => handle_config(&resolved, command),
    }
}

fn handle_plan(resolved: &ResolvedConfig, command: PlanCommands) -> Result<()> {
    let mut kernel = open_kernel(resolved)?;

    match command {
        PlanCommands::Propose {
            intent,
            summary,
            target,
            base_risk,
            reversibility,
            explanation,
            reasons,
            permissions,
            reads,
            writes,
        } => plan::propose(
            &mut kernel,
            ProposeArgs {
                intent,
                summary,
                target,
                base_risk,
                reversibility,
                explanation,
                reasons,
                permissions,
                reads,
                writes,
            },
        ),
        PlanCommands::Verify { file } => plan::verify(&mut kernel, &file),
        PlanCommands::List => {
            plan::list(&kernel);
            Ok(())
        },
    }
}

fn handle_vault(resolved: &ResolvedConfig, command: VaultCommands) -> Result<()> {
    let mut kernel = open_kernel(resolved)?;

    match command {
        VaultCommands::Summary => {
            vault::summary(&kernel);
            Ok(())
        },
        VaultCommands::Export => vault::export(&kernel),
        VaultCommands::Purge { yes } => {
            vault::purge(&mut kernel, yes);
            Ok(())
        },
    }
}

fn handle_config(resolved: &ResolvedConfig, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { format } => config::show(resolved, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_propose_args_parse() {
        let cli = Cli::try_parse_from([
            "keystone",
            "plan",
            "propose",
            "--intent",
            "send-message",
            "--summary",
            "Reply to Sam",
            "--target",
            "sam",
            "--base-risk",
            "60",
            "--permission",
            "messages",
            "--write",
            "send_message",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan {
                command:
                    PlanCommands::Propose {
                        intent,
                        base_risk,
                        reversibility,
                        writes,
                        ..
                    },
            } => {
                assert_eq!(intent, IntentArg::SendMessage);
                assert_eq!(base_risk, 60);
                assert_eq!(reversibility, ReversibilityArg::Irreversible);
                assert_eq!(writes, vec!["send_message".to_string()]);
            },
            _ => panic!("expected plan propose"),
        }
    }

    #[test]
    fn test_purge_requires_flag_for_confirmation() {
        let cli = Cli::try_parse_from(["keystone", "vault", "purge"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Vault {
                command: VaultCommands::Purge { yes: false }
            }
        ));
    }

    #[test]
    fn test_log_config_from_section() {
        let mut config = Config::default();
        config.logging.format = "json".into();
        config.logging.directives = vec!["keystone_audit=trace".into()];

        let lc = log_config(&config, false);
        assert_eq!(lc.level, "info");
        assert_eq!(lc.format, LogFormat::Json);
        assert_eq!(lc.directives, vec!["keystone_audit=trace".to_string()]);

        assert_eq!(log_config(&config, true).level, "debug");
    }
}
