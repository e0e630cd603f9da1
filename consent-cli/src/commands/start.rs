//! `consent start`: the application-startup path.
//!
//! Prompts when no decision is stored, resends an unacknowledged decision in
//! the background, and otherwise does nothing. Sync failures are reported
//! but do not fail the command.

use anyhow::{Context, Result};
use colored::Colorize;

use consent_sync::Startup;

use super::context::{describe, AppContext};
use super::prompt::TerminalPrompt;

pub async fn run() -> Result<()> {
    let ctx = AppContext::load()?;
    let startup = ctx
        .coordinator
        .initialize_and_reconcile(&TerminalPrompt)
        .context("consent startup failed")?;

    let task = match startup {
        Startup::UpToDate => {
            println!("✓ Consent {}: already in sync", ctx.coordinator.status());
            return Ok(());
        }
        Startup::Prompted(None) => {
            println!("No decision recorded; you will be asked again next time.");
            return Ok(());
        }
        Startup::Prompted(Some(task)) => task,
        Startup::Reconciling(task) => {
            println!("Resending consent {} to {}…", ctx.coordinator.status(), ctx.config.endpoint);
            task
        }
    };

    let result = task.wait().await;
    let line = format!("Consent {}: {}", ctx.coordinator.status(), describe(&result));
    if result.is_ok() {
        println!("✓ {}", line.green());
    } else {
        tracing::warn!(home = %ctx.home.display(), "startup sync did not complete");
        println!("⚠ {}", line.yellow());
    }
    Ok(())
}
