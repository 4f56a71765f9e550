//! Vault commands: summarize, export and purge the audit vault.

use keystone_audit::PurgeOutcome;
use keystone_kernel::AuthorizationKernel;

use crate::theme::Theme;

/// Print aggregate vault counts.
pub(crate) fn summary(kernel: &AuthorizationKernel) {
    let summary = kernel.vault_summary();

    println!("\n{}", Theme::header("Audit Vault"));
    println!("{}", Theme::separator());

    if !kernel.vault().is_enabled() {
        println!("{}", Theme::warning("The vault is disabled; nothing is recorded."));
    }

    println!("  Events retained:   {}", summary.total);
    println!("  Last 7 days:       {}", summary.last_7_days);
    println!("  Edits:             {}", summary.edit_count);
    println!("  Exports:           {}", summary.export_count);
    match summary.last_verified {
        Some(day) => println!("  Last verified:     {day}"),
        None => println!("  Last verified:     {}", Theme::dimmed("never")),
    }
    if let (Some(oldest), Some(newest)) = (summary.oldest_sequence, summary.newest_sequence) {
        println!("  Sequence range:    {oldest}..={newest}");
    }

    if !summary.by_kind.is_empty() {
        println!("\n  {}", Theme::header("By kind"));
        for (kind, count) in &summary.by_kind {
            println!("    {kind:<24} {count}");
        }
    }
    println!();
}

/// Print a validated, content-free export as JSON.
pub(crate) fn export(kernel: &AuthorizationKernel) -> anyhow::Result<()> {
    let export = kernel.export_vault()?;
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

/// Purge the vault. Without `confirmed` nothing is changed.
pub(crate) fn purge(kernel: &mut AuthorizationKernel, confirmed: bool) {
    match kernel.purge_vault(confirmed) {
        PurgeOutcome::NotEnabled => {
            println!("{}", Theme::warning("The vault is disabled; nothing to purge."));
        },
        PurgeOutcome::RequiresConfirmation => {
            println!(
                "{}",
                Theme::info("This destroys every vault event. Re-run with --yes to confirm.")
            );
        },
        PurgeOutcome::Success(count) => {
            println!(
                "{}",
                Theme::success(&format!("Purged {count} event(s); a purge marker remains."))
            );
        },
    }
}
