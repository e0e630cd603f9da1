//! `consent sync`: resend the stored decision with backoff.

use anyhow::Result;
use colored::Colorize;

use super::context::{describe, AppContext};

pub async fn run() -> Result<()> {
    let ctx = AppContext::load()?;
    let status = ctx.coordinator.status();
    if !status.is_defined() {
        println!("No consent decision recorded. Run `consent start` or `consent accept|deny`.");
        return Ok(());
    }

    let result = ctx.coordinator.reconcile().await;
    let line = format!("Consent {status}: {}", describe(&result));
    if result.is_ok() {
        println!("✓ {}", line.green());
    } else {
        println!("⚠ {}", line.yellow());
        println!("  {}", "The endpoint will be retried on the next `consent start`.".bright_black());
    }
    result?;
    Ok(())
}
